use std::{collections::BTreeMap, env::consts::EXE_SUFFIX, path::Path};

use tokio::fs;
use tracing::debug;

use lunepack::{
    archive::{Archive, ArchiveBuilder, Manifest},
    utils::{env::ENV_OPTIONS, files::is_executable},
};

use super::{
    classify::{Classification, FileCategory, NATIVE_DIR},
    result::BuildResult,
};

/**
    Returns the archive path the interpreter binary is stored at.
*/
pub fn interpreter_archive_path() -> String {
    format!("bin/lunepack{EXE_SUFFIX}")
}

/**
    Reads every classified file, along with the interpreter, into a new archive.

    Files are stored in classification order, so the same
    inputs always produce the exact same archive.
*/
pub async fn bundle(
    classification: &Classification,
    interpreter: &Path,
    compressed: bool,
) -> BuildResult<Archive> {
    let mut builder = ArchiveBuilder::new();

    let interpreter_path = interpreter_archive_path();
    builder.add_file(interpreter_path.clone(), &fs::read(interpreter).await?, true)?;

    for file in &classification.files {
        let contents = fs::read(&file.source_path).await?;
        // Only resources may be programs or libraries of their own
        let executable = file.category == FileCategory::ExtraResource
            && is_executable(&file.source_path).await?;
        debug!(
            source = %file.source_path.display(),
            path = %file.archive_path,
            len = contents.len(),
            "adding file to archive"
        );
        builder.add_file(file.archive_path.clone(), &contents, executable)?;
    }

    let library_paths = if classification.has_resources() {
        vec![NATIVE_DIR.to_string()]
    } else {
        Vec::new()
    };

    // Interpreter options of the build environment must not leak into the program
    let environment = BTreeMap::from([(ENV_OPTIONS.to_string(), None)]);

    Ok(builder.finish(Manifest {
        entry_script: classification.entry_script.clone(),
        interpreter: interpreter_path,
        search_paths: classification.search_paths.clone(),
        library_paths,
        environment,
        compressed,
    }))
}
