//! Startup requirement validation for herakles-rdt-exporter.
//!
//! This module validates that the exporter has all necessary permissions
//! and a usable resctrl mount before starting.

use nix::unistd::geteuid;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::cli::BackendKind;

/// Validate all runtime requirements for the selected backend
pub fn validate_requirements(backend: BackendKind, resctrl_root: &Path) -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    match backend {
        BackendKind::Resctrl => {
            check_user_privileges();
            check_resctrl_mount(resctrl_root)?;
            check_resctrl_monitoring(resctrl_root)?;
        }
        BackendKind::Synthetic => {
            info!("✅ Synthetic backend selected - no hardware requirements");
        }
    }

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// Check if running with sufficient privileges
fn check_user_privileges() {
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - creating monitoring groups will likely fail");
        warn!("   Recommendation: Run as root or grant write access to the resctrl mount");
    } else {
        info!("✅ Running as root (uid=0)");
    }
}

/// Check that resctrl is mounted at the configured path
fn check_resctrl_mount(root: &Path) -> Result<(), ValidationError> {
    if !root.join("info").is_dir() {
        error!("❌ {} is not a resctrl mount", root.display());
        error!("   Solution: mount -t resctrl resctrl {}", root.display());
        return Err(ValidationError::ResctrlNotMounted(
            root.display().to_string(),
        ));
    }

    info!("✅ resctrl mounted at {}", root.display());
    Ok(())
}

/// Check that L3 monitoring is available and monitoring groups can be created
fn check_resctrl_monitoring(root: &Path) -> Result<(), ValidationError> {
    let features = root.join("info/L3_MON/mon_features");
    match fs::read_to_string(&features) {
        Ok(content) => {
            let list: Vec<&str> = content.split_whitespace().collect();
            debug!("L3 monitoring features: {:?}", list);
            if list.is_empty() {
                error!("❌ {} lists no monitoring features", features.display());
                return Err(ValidationError::NoMonitoring);
            }
            info!("✅ L3 monitoring features: {}", list.join(", "));
        }
        Err(e) => {
            error!("❌ Cannot read {}: {}", features.display(), e);
            error!("   The CPU or kernel does not support RDT monitoring (CONFIG_X86_CPU_RESCTRL, cqm/mbm)");
            return Err(ValidationError::NoMonitoring);
        }
    }

    let mon_groups = root.join("mon_groups");
    match fs::metadata(&mon_groups) {
        Ok(metadata) => {
            use std::os::unix::fs::PermissionsExt;
            let mode = metadata.permissions().mode();
            if mode & 0o200 == 0 {
                error!("❌ {} is not writable", mon_groups.display());
                return Err(ValidationError::MonGroupsNotWritable(
                    "directory is read-only".to_string(),
                ));
            }
            info!("✅ {} is accessible and writable", mon_groups.display());
        }
        Err(e) => {
            error!("❌ Cannot access {}: {}", mon_groups.display(), e);
            return Err(ValidationError::MonGroupsNotWritable(e.to_string()));
        }
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("resctrl filesystem not mounted at {0}")]
    ResctrlNotMounted(String),

    #[error("L3 monitoring not supported by this system")]
    NoMonitoring,

    #[error("resctrl mon_groups not writable: {0}")]
    MonGroupsNotWritable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_backend_has_no_requirements() {
        assert!(validate_requirements(BackendKind::Synthetic, Path::new("/nonexistent")).is_ok());
    }

    #[test]
    fn missing_mount_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_requirements(BackendKind::Resctrl, dir.path()).unwrap_err();
        assert!(matches!(err, ValidationError::ResctrlNotMounted(_)));
    }

    #[test]
    fn complete_tree_passes() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("info/L3_MON")).unwrap();
        fs::create_dir_all(dir.path().join("mon_groups")).unwrap();
        fs::write(
            dir.path().join("info/L3_MON/mon_features"),
            "llc_occupancy\nmbm_total_bytes\nmbm_local_bytes\n",
        )
        .unwrap();
        assert!(validate_requirements(BackendKind::Resctrl, dir.path()).is_ok());
    }

    #[test]
    fn empty_features_fail() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("info/L3_MON")).unwrap();
        fs::write(dir.path().join("info/L3_MON/mon_features"), "").unwrap();
        assert!(matches!(
            validate_requirements(BackendKind::Resctrl, dir.path()),
            Err(ValidationError::NoMonitoring)
        ));
    }
}
