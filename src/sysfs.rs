use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Relative location of the power supply class directory.
pub const POWER_SUPPLY_CLASS: &str = "sys/class/power_supply";

/// Filesystem root that sysfs paths are resolved against.
/// `/` in production; tests point it at a temp directory.
#[derive(Debug, Clone)]
pub struct SysfsRoot {
    root: PathBuf,
}

impl Default for SysfsRoot {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
        }
    }
}

impl SysfsRoot {
    pub fn system() -> Self {
        Self::default()
    }

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Path of one attribute of a power supply, e.g. `("battery", "temp")`.
    pub fn supply_attr(&self, supply: &str, attr: &str) -> PathBuf {
        Path::new(POWER_SUPPLY_CLASS).join(supply).join(attr)
    }

    /// Read an attribute, trimming the trailing newline.
    pub fn read(&self, relative: impl AsRef<Path>) -> Result<String> {
        let path = self.path(relative);
        std::fs::read_to_string(&path)
            .map(|s| s.trim().to_string())
            .map_err(|source| Error::SysfsRead { path, source })
    }

    /// Read an attribute, returning None if it doesn't exist or isn't readable.
    pub fn read_optional(&self, relative: impl AsRef<Path>) -> Result<Option<String>> {
        let path = self.path(relative);
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Ok(None),
            Err(source) => Err(Error::SysfsRead { path, source }),
        }
    }

    pub fn write(&self, relative: impl AsRef<Path>, value: &str) -> Result<()> {
        let path = self.path(relative);
        std::fs::write(&path, value).map_err(|source| Error::SysfsWrite { path, source })
    }

    pub fn read_parse<T: std::str::FromStr>(&self, relative: impl AsRef<Path>) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        let relative = relative.as_ref();
        let value = self.read(relative)?;
        value.parse::<T>().map_err(|e| Error::Parse {
            path: self.path(relative),
            detail: format!("failed to parse '{}': {}", value, e),
        })
    }

    /// Sorted entry names of a directory.
    pub fn list_dir(&self, relative: impl AsRef<Path>) -> Result<Vec<String>> {
        let path = self.path(relative);
        let entries = std::fs::read_dir(&path).map_err(|source| Error::SysfsRead {
            path: path.clone(),
            source,
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::SysfsRead {
                path: path.clone(),
                source,
            })?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn exists(&self, relative: impl AsRef<Path>) -> bool {
        self.path(relative).exists()
    }

    /// First power supply whose `type` attribute is one of `types`.
    pub fn find_supply(&self, types: &[&str]) -> Option<String> {
        let entries = self.list_dir(POWER_SUPPLY_CLASS).ok()?;
        entries.into_iter().find(|name| {
            self.read_optional(self.supply_attr(name, "type"))
                .unwrap_or(None)
                .is_some_and(|t| types.contains(&t.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_supply(root: &Path, name: &str, ptype: &str) {
        let dir = root.join(POWER_SUPPLY_CLASS).join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("type"), format!("{}\n", ptype)).unwrap();
    }

    #[test]
    fn test_read_write_attr() {
        let tmp = tempfile::tempdir().unwrap();
        let sysfs = SysfsRoot::new(tmp.path());
        make_supply(tmp.path(), "battery", "Battery");

        let temp = sysfs.supply_attr("battery", "temp");
        sysfs.write(&temp, "312\n").unwrap();
        assert_eq!(sysfs.read(&temp).unwrap(), "312");
        assert_eq!(sysfs.read_parse::<i32>(&temp).unwrap(), 312);
    }

    #[test]
    fn test_read_optional_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let sysfs = SysfsRoot::new(tmp.path());
        assert_eq!(
            sysfs
                .read_optional(sysfs.supply_attr("battery", "capacity"))
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_parse_error_names_path() {
        let tmp = tempfile::tempdir().unwrap();
        let sysfs = SysfsRoot::new(tmp.path());
        make_supply(tmp.path(), "battery", "Battery");
        let attr = sysfs.supply_attr("battery", "capacity");
        sysfs.write(&attr, "lots").unwrap();

        let err = sysfs.read_parse::<i32>(&attr).unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn test_find_supply_by_type() {
        let tmp = tempfile::tempdir().unwrap();
        make_supply(tmp.path(), "battery", "Battery");
        make_supply(tmp.path(), "max77693-charger", "Mains");
        let sysfs = SysfsRoot::new(tmp.path());

        assert_eq!(
            sysfs.find_supply(&["Mains", "USB"]).as_deref(),
            Some("max77693-charger")
        );
        assert_eq!(sysfs.find_supply(&["Battery"]).as_deref(), Some("battery"));
        assert_eq!(sysfs.find_supply(&["Wireless"]), None);
    }
}
