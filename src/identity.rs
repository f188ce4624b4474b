//! Container identity extraction from working directories.
//!
//! YARN container processes run inside a fixed directory layout:
//! `/<mount>/yarn/usercache/<user>/appcache/<application-id>/<container-id>`.
//! The application and container ids sit at fixed positions in that path.

use std::path::Path;

use crate::error::AgentError;

/// Zero-based segment positions when splitting an absolute path on `/`
/// (the leading separator yields an empty first segment).
const APPLICATION_SEGMENT: usize = 6;
const CONTAINER_SEGMENT: usize = 7;

/// Identity of a YARN container process, fixed for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerIdentity {
    pub application: String,
    pub container: String,
}

impl ContainerIdentity {
    /// Extract the identity from a container process's working directory.
    ///
    /// A path with fewer segments than the appcache layout requires yields
    /// [`AgentError::MalformedIdentity`]; the caller skips the process.
    pub fn from_cwd(cwd: &Path) -> Result<Self, AgentError> {
        let path = cwd.to_string_lossy();
        let segments: Vec<&str> = path.split('/').collect();

        match (
            segments.get(APPLICATION_SEGMENT),
            segments.get(CONTAINER_SEGMENT),
        ) {
            (Some(application), Some(container))
                if !application.is_empty() && !container.is_empty() =>
            {
                Ok(Self {
                    application: (*application).to_string(),
                    container: (*container).to_string(),
                })
            }
            _ => Err(AgentError::MalformedIdentity(cwd.to_path_buf())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_extracts_application_and_container() {
        let cwd =
            PathBuf::from("/mnt1/yarn/usercache/hadoop/appcache/application_123/container_456");
        let id = ContainerIdentity::from_cwd(&cwd).expect("extract");
        assert_eq!(id.application, "application_123");
        assert_eq!(id.container, "container_456");
    }

    #[test]
    fn test_real_world_container_path() {
        let cwd = PathBuf::from(
            "/mnt1/yarn/usercache/hadoop/appcache/application_1697720075274_7464/container_1697720075274_7464_01_000036",
        );
        let id = ContainerIdentity::from_cwd(&cwd).expect("extract");
        assert_eq!(id.application, "application_1697720075274_7464");
        assert_eq!(id.container, "container_1697720075274_7464_01_000036");
    }

    #[test]
    fn test_short_path_is_malformed_not_a_panic() {
        let cwd = PathBuf::from("/tmp");
        let err = ContainerIdentity::from_cwd(&cwd).expect_err("must fail");
        assert!(matches!(err, AgentError::MalformedIdentity(_)));
    }

    #[test]
    fn test_seven_segment_path_is_malformed() {
        // One segment short of the appcache layout.
        let cwd = PathBuf::from("/mnt1/yarn/usercache/hadoop/appcache/application_123");
        let err = ContainerIdentity::from_cwd(&cwd).expect_err("must fail");
        assert!(matches!(err, AgentError::MalformedIdentity(_)));
    }

    #[test]
    fn test_trailing_slash_rejected() {
        // A trailing slash would make the container segment empty.
        let cwd = PathBuf::from("/mnt1/yarn/usercache/hadoop/appcache/application_123/");
        assert!(ContainerIdentity::from_cwd(&cwd).is_err());
    }
}
