//! Filesystem helpers

use std::fs;
use std::path::Path;

use super::error::{WalkthroughError, Result};

/// Check that a path exists and is a regular file
///
/// # Returns
///
/// `Ok(())` if the file exists, `NotFound` otherwise.
pub fn check_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(WalkthroughError::NotFound(format!(
            "file does not exist: {}",
            path.display()
        )));
    }

    if !path.is_file() {
        return Err(WalkthroughError::NotFound(format!(
            "path is not a file: {}",
            path.display()
        )));
    }

    Ok(())
}

/// Read a file after checking that it exists
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    check_file_exists(path)?;

    fs::read(path).map_err(WalkthroughError::Io)
}

/// Create a directory (and parents) if it is missing
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        log::debug!("Creating directory {}", path.display());
        fs::create_dir_all(path)?;
    } else if !path.is_dir() {
        return Err(WalkthroughError::Config(format!(
            "{} exists but is not a directory",
            path.display()
        )));
    }
    Ok(())
}

/// Create or truncate `path` for private key material
///
/// On unix the file is owner-only before anything is written to it,
/// including when it already existed with wider permissions.
pub fn prepare_private_file(path: &Path) -> Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        let file = options.open(path)?;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        Ok(file)
    }

    #[cfg(not(unix))]
    Ok(options.open(path)?)
}

/// Write private key material, readable by the owner only on unix
pub fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    use std::io::Write;

    let mut file = prepare_private_file(path)?;
    file.write_all(contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_check_file_exists() {
        let path = PathBuf::from("Cargo.toml");
        assert!(check_file_exists(&path).is_ok(), "Should find an existing file");

        let path = PathBuf::from("non_existent_file.txt");
        assert!(matches!(check_file_exists(&path), Err(WalkthroughError::NotFound(_))));

        let path = PathBuf::from("src");
        assert!(check_file_exists(&path).is_err(), "A directory is not a file");
    }

    #[test]
    fn test_read_file() {
        let content = read_file(&PathBuf::from("Cargo.toml")).unwrap();
        assert!(!content.is_empty());

        assert!(read_file(&PathBuf::from("non_existent_file.txt")).is_err());
    }

    #[test]
    fn test_ensure_dir_and_write_private() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());

        let key = nested.join("key.pem");
        write_private(&key, b"secret").unwrap();
        assert_eq!(fs::read(&key).unwrap(), b"secret");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&key).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        assert!(ensure_dir(&key).is_err(), "A file cannot become a directory");
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_key_file_is_restricted() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("key.pem");
        fs::write(&key, b"old key material").unwrap();
        fs::set_permissions(&key, fs::Permissions::from_mode(0o644)).unwrap();

        let file = prepare_private_file(&key).unwrap();
        assert_eq!(file.metadata().unwrap().len(), 0);
        assert_eq!(fs::metadata(&key).unwrap().permissions().mode() & 0o777, 0o600);

        write_private(&key, b"new").unwrap();
        assert_eq!(fs::read(&key).unwrap(), b"new");
        assert_eq!(fs::metadata(&key).unwrap().permissions().mode() & 0o777, 0o600);
    }
}
