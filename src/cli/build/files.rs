use std::path::{Path, PathBuf};

/**
    Removes the source file extension from the given path, if it has one.

    A source file extension is an extension such as `.lua`.
*/
pub fn remove_source_file_ext(path: &Path) -> PathBuf {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("lua"))
    {
        path.with_extension("")
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_only_source_extensions() {
        assert_eq!(
            remove_source_file_ext(Path::new("app/main.lua")),
            PathBuf::from("app/main")
        );
        assert_eq!(
            remove_source_file_ext(Path::new("app/main.txt")),
            PathBuf::from("app/main.txt")
        );
    }
}
