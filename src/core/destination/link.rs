//! Auxiliary links to exported artifacts

use crate::config::LinkConfig;
use crate::core::template::PathTemplate;
use crate::domain::{ExportError, Instance, Result};
use std::path::{Component, Path, PathBuf};

/// One compiled link descriptor
///
/// Unset parts fall back to the owning destination: its `topdir`, its
/// directory template and the exported filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpec {
    topdir: Option<PathBuf>,
    dir: Option<PathTemplate>,
    filename: Option<PathTemplate>,
}

impl LinkSpec {
    /// Compiles the `link = "<dir template>"` shorthand
    ///
    /// # Errors
    ///
    /// Returns an error if the template does not compile.
    pub fn from_dir(dir: &str) -> Result<Self> {
        Ok(Self {
            topdir: None,
            dir: Some(PathTemplate::parse(dir)?),
            filename: None,
        })
    }

    /// Compiles one `[[destinations.links]]` entry
    ///
    /// # Errors
    ///
    /// Returns an error if a template does not compile.
    pub fn from_config(config: &LinkConfig) -> Result<Self> {
        Ok(Self {
            topdir: config.topdir.clone(),
            dir: config.dir.as_deref().map(PathTemplate::parse).transpose()?,
            filename: config.filename.as_deref().map(PathTemplate::parse).transpose()?,
        })
    }

    /// Resolves the link path for an instance
    ///
    /// # Errors
    ///
    /// Returns an error if a template fails to render.
    pub fn resolve(
        &self,
        instance: &Instance,
        topdir: Option<&Path>,
        dir: &PathTemplate,
        filename: &str,
    ) -> Result<PathBuf> {
        let topdir = self.topdir.as_deref().or(topdir);
        let dir = self.dir.as_ref().unwrap_or(dir).render(instance)?;
        let link_dir = join_under(topdir, &dir)?;
        let name = match &self.filename {
            Some(template) => template.render(instance)?,
            None => filename.to_string(),
        };
        ensure_contained(&name)?;
        Ok(link_dir.join(name))
    }
}

/// Joins a rendered relative path under an optional top-level directory
///
/// A leading `/` in the rendered part does not escape `topdir`.
///
/// # Errors
///
/// Returns [`ExportError::Destination`] if the rendered part climbs out of
/// `topdir`.
pub fn join_under(topdir: Option<&Path>, rendered: &str) -> Result<PathBuf> {
    match topdir {
        Some(top) => {
            let relative = rendered.trim_start_matches('/');
            ensure_contained(relative)?;
            Ok(top.join(relative))
        }
        None => Ok(PathBuf::from(rendered)),
    }
}

/// Rejects a rendered relative path that is absolute or contains `..`
///
/// # Errors
///
/// Returns [`ExportError::Destination`] naming the offending path.
pub fn ensure_contained(relative: &str) -> Result<()> {
    let escapes = Path::new(relative).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(ExportError::Destination(format!(
            "rendered path '{relative}' leaves its parent directory"
        )));
    }
    Ok(())
}

/// Creates a symbolic link at `link` pointing to `target`
///
/// Relative targets are made absolute so the link resolves regardless of
/// where it is placed.
pub async fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    let target = if target.is_absolute() {
        target.to_path_buf()
    } else {
        std::env::current_dir()?.join(target)
    };

    if let Some(parent) = link.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    #[cfg(unix)]
    {
        tokio::fs::symlink(&target, link).await
    }
    #[cfg(windows)]
    {
        tokio::fs::symlink_file(&target, link).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeEvent, ChangeType, InstanceId};
    use serde_json::json;

    fn instance() -> Instance {
        let mut inst = Instance::new(
            InstanceId::new("abc").unwrap(),
            ChangeEvent::new("abc", ChangeType::NewInstance, 1),
        );
        inst.merge_tags(json!({"PatientID": "P001"}).as_object().unwrap().clone());
        inst
    }

    #[test]
    fn test_join_under() {
        assert_eq!(
            join_under(Some(Path::new("/srv")), "/a/b").unwrap(),
            PathBuf::from("/srv/a/b")
        );
        assert_eq!(
            join_under(Some(Path::new("/srv")), "").unwrap(),
            PathBuf::from("/srv/")
        );
        assert_eq!(
            join_under(None, "rel/dir").unwrap(),
            PathBuf::from("rel/dir")
        );
    }

    #[test]
    fn test_join_under_rejects_parent_components() {
        for rendered in ["..", "a/../../x", "/../etc", "a/b/.."] {
            assert!(
                matches!(
                    join_under(Some(Path::new("/srv")), rendered),
                    Err(ExportError::Destination(_))
                ),
                "{rendered} should be rejected"
            );
        }
        assert!(join_under(Some(Path::new("/srv")), "a/..b/c").is_ok());
    }

    #[test]
    fn test_tag_value_cannot_climb_out_of_link_dir() {
        let mut inst = instance();
        inst.merge_tags(json!({"PatientID": "../../x"}).as_object().unwrap().clone());
        let link = LinkSpec::from_dir("by-patient/{PatientID}").unwrap();
        let dest_dir = PathTemplate::parse("{ID}").unwrap();
        let path = link
            .resolve(&inst, Some(Path::new("/srv/out")), &dest_dir, "a.jpg")
            .unwrap();
        assert_eq!(path, PathBuf::from("/srv/out/by-patient/.._.._x/a.jpg"));
    }

    #[test]
    fn test_link_filename_must_stay_in_link_dir() {
        let link = LinkSpec::from_config(&LinkConfig {
            topdir: Some(PathBuf::from("/srv/links")),
            dir: Some("flat".to_string()),
            filename: Some("../{PatientID}.jpg".to_string()),
        })
        .unwrap();
        let dest_dir = PathTemplate::parse("{ID}").unwrap();
        assert!(link
            .resolve(&instance(), None, &dest_dir, "a.jpg")
            .is_err());
    }

    #[test]
    fn test_shorthand_uses_destination_topdir_and_filename() {
        let link = LinkSpec::from_dir("by-patient/{PatientID}").unwrap();
        let dest_dir = PathTemplate::parse("{ID}").unwrap();
        let path = link
            .resolve(&instance(), Some(Path::new("/srv/out")), &dest_dir, "a.jpg")
            .unwrap();
        assert_eq!(path, PathBuf::from("/srv/out/by-patient/P001/a.jpg"));
    }

    #[test]
    fn test_link_config_overrides() {
        let link = LinkSpec::from_config(&LinkConfig {
            topdir: Some(PathBuf::from("/srv/links")),
            dir: None,
            filename: Some("{PatientID}.jpg".to_string()),
        })
        .unwrap();
        let dest_dir = PathTemplate::parse("{ID}").unwrap();
        let path = link
            .resolve(&instance(), Some(Path::new("/srv/out")), &dest_dir, "a.jpg")
            .unwrap();
        assert_eq!(path, PathBuf::from("/srv/links/abc/P001.jpg"));
    }

    #[test]
    fn test_link_config_bad_template() {
        let config = LinkConfig {
            dir: Some("{nope}".to_string()),
            ..LinkConfig::default()
        };
        assert!(LinkSpec::from_config(&config).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_create_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("file.jpg");
        tokio::fs::write(&target, b"x").await.unwrap();

        let link = dir.path().join("nested/link.jpg");
        create_symlink(&target, &link).await.unwrap();

        assert_eq!(tokio::fs::read_link(&link).await.unwrap(), target);
        assert!(create_symlink(&target, &link).await.is_err());
    }
}
