use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use tokio::{
    process::{Child, Command},
    signal,
};
use tracing::debug;

use lunepack::{
    archive::Manifest,
    utils::{
        env::{prepend_path_var, DYLIB_PATH_VAR, ENV_EXECUTABLE, ENV_SEARCH_PATH},
        path::join_archive_path,
    },
};

use super::result::{LaunchError, LaunchResult};

fn resolve(root: &Path, archive_path: &str) -> LaunchResult<PathBuf> {
    join_archive_path(root, archive_path)
        .ok_or_else(|| LaunchError::InvalidPath(archive_path.to_string()))
}

fn resolve_all(root: &Path, archive_paths: &[String]) -> LaunchResult<Vec<PathBuf>> {
    archive_paths
        .iter()
        .map(|path| resolve(root, path))
        .collect()
}

/**
    Creates the command that runs the entry script of an extracted archive,
    using the extracted interpreter, with the given program arguments.

    The command inherits all standard streams and the working directory.
*/
pub fn command(
    root: &Path,
    manifest: &Manifest,
    executable: &Path,
    args: impl IntoIterator<Item = OsString>,
) -> LaunchResult<Command> {
    let interpreter = resolve(root, &manifest.interpreter)?;
    let entry = resolve(root, &manifest.entry_script)?;

    let mut command = Command::new(interpreter);
    command.arg("run").arg("--").arg(entry).args(args);

    let library_paths = resolve_all(root, &manifest.library_paths)?;
    if !library_paths.is_empty() {
        command.env(
            DYLIB_PATH_VAR,
            prepend_path_var(DYLIB_PATH_VAR, library_paths)?,
        );
    }

    let search_paths = resolve_all(root, &manifest.search_paths)?;
    if !search_paths.is_empty() {
        command.env(
            ENV_SEARCH_PATH,
            prepend_path_var(ENV_SEARCH_PATH, search_paths)?,
        );
    }

    for (key, value) in &manifest.environment {
        match value {
            Some(value) => command.env(key, value),
            None => command.env_remove(key),
        };
    }
    command.env(ENV_EXECUTABLE, executable);

    command
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    Ok(command)
}

/**
    Spawns the given command.
*/
pub fn spawn(command: &mut Command) -> LaunchResult<Child> {
    debug!(?command, "launching interpreter");
    command.spawn().map_err(|source| LaunchError::Spawn {
        path: PathBuf::from(command.as_std().get_program()),
        source,
    })
}

/**
    Waits for the child to exit, and returns its exit code.

    Interrupts are ignored while waiting, the child receives them
    too and decides by itself whether or not it should exit.
*/
pub async fn wait(mut child: Child) -> LaunchResult<i32> {
    loop {
        tokio::select! {
            status = child.wait() => {
                return Ok(exit_code(status.map_err(LaunchError::Wait)?));
            }
            res = signal::ctrl_c() => {
                if let Err(e) = res {
                    debug!("failed to listen for interrupts: {e}");
                    let status = child.wait().await.map_err(LaunchError::Wait)?;
                    return Ok(exit_code(status));
                }
                debug!("ignoring interrupt while the program is running");
            }
        }
    }
}

/**
    Converts an exit status into an exit code, where a program
    terminated by a signal exits with 128 plus the signal number.
*/
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn manifest() -> Manifest {
        Manifest {
            entry_script: "app/main.lua".to_string(),
            interpreter: "bin/lunepack".to_string(),
            search_paths: vec!["app".to_string(), "lib/0".to_string()],
            library_paths: vec!["native".to_string()],
            environment: BTreeMap::from([
                ("LUNEPACK_OPTS".to_string(), None),
                ("GREETING".to_string(), Some("hello".to_string())),
            ]),
            compressed: false,
        }
    }

    #[test]
    fn runs_the_entry_script_with_the_original_arguments() {
        let root = Path::new("/tmp/lunepack-1-x");
        let command = command(
            root,
            &manifest(),
            Path::new("/usr/bin/prog"),
            [OsString::from("foo"), OsString::from("bar baz")],
        )
        .unwrap();
        let command = command.as_std();

        assert_eq!(Path::new(command.get_program()), root.join("bin").join("lunepack"));
        let args = command.get_args().collect::<Vec<_>>();
        assert_eq!(args[..2], ["run", "--"]);
        assert_eq!(Path::new(args[2]), root.join("app").join("main.lua"));
        assert_eq!(args[3..], ["foo", "bar baz"]);
    }

    #[test]
    fn prepends_extracted_directories_and_applies_overrides() {
        let root = Path::new("/tmp/lunepack-1-x");
        let command = command(root, &manifest(), Path::new("/usr/bin/prog"), []).unwrap();
        let envs = command
            .as_std()
            .get_envs()
            .map(|(key, value)| (key.to_os_string(), value.map(|v| v.to_os_string())))
            .collect::<BTreeMap<_, _>>();

        let search = envs[&OsString::from(ENV_SEARCH_PATH)].clone().unwrap();
        let search = std::env::split_paths(&search).collect::<Vec<_>>();
        assert_eq!(search[0], root.join("app"));
        assert_eq!(search[1], root.join("lib").join("0"));

        let libs = envs[&OsString::from(DYLIB_PATH_VAR)].clone().unwrap();
        assert_eq!(
            std::env::split_paths(&libs).next(),
            Some(root.join("native"))
        );

        assert_eq!(envs[&OsString::from("LUNEPACK_OPTS")], None);
        assert_eq!(
            envs[&OsString::from("GREETING")],
            Some(OsString::from("hello"))
        );
        assert_eq!(
            envs[&OsString::from(ENV_EXECUTABLE)],
            Some(OsString::from("/usr/bin/prog"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn signals_map_above_128() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(exit_code(ExitStatus::from_raw(9)), 137);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
    }
}
