//! Volume mount classification.

use super::types::VolumeClassification;
use crate::common::to_k8s_name;
use crate::parser::{ComposeVolumeMount, MountType};
use std::collections::HashSet;
use std::path::Path;

/// Directory names that mark key material when they appear as a whole path
/// segment of the source or target.
const SECRET_PATH_SEGMENTS: &[&str] = &["ssl", "certs", "tls", "private", "secrets"];

const SECRET_EXTENSIONS: &[&str] = &["key", "pem", "crt", "cert", "p12", "pfx", "jks"];

fn has_secret_segment(path: &str) -> bool {
    path.to_lowercase()
        .split(['/', '\\'])
        .any(|segment| SECRET_PATH_SEGMENTS.contains(&segment))
}

fn extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_lowercase)
}

/// Whether `path` equals `prefix` or lies below it.
fn is_under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Classify a mount into a Kubernetes storage strategy.
///
/// Rules apply in order: tmpfs or `/tmp` targets are scratch space, named
/// volumes get claims, bind mounts of key material become Secrets, single
/// files become ConfigMaps and directories get claims. Anonymous volumes
/// get claims.
pub fn classify_volume(mount: &ComposeVolumeMount) -> VolumeClassification {
    if mount.mount_type == MountType::Tmpfs || is_under(&mount.target, "/tmp") {
        return VolumeClassification::EmptyDir;
    }

    if mount.is_named_volume() {
        return VolumeClassification::Pvc;
    }

    if mount.mount_type == MountType::Bind {
        return classify_bind_mount(mount);
    }

    VolumeClassification::Pvc
}

fn classify_bind_mount(mount: &ComposeVolumeMount) -> VolumeClassification {
    if has_secret_segment(&mount.source) || has_secret_segment(&mount.target) {
        return VolumeClassification::Secret;
    }

    match extension(&mount.source) {
        Some(ext) if SECRET_EXTENSIONS.contains(&ext.as_str()) => VolumeClassification::Secret,
        Some(_) => VolumeClassification::ConfigMap,
        None => VolumeClassification::Pvc,
    }
}

/// Suggested Kubernetes volume name: `<service>-<last target segment>`,
/// or `<service>-data` when the target has no usable segment.
pub fn suggested_volume_name(service_name: &str, target: &str) -> String {
    let last = target
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("data");
    to_k8s_name(&format!("{}-{}", service_name, last))
}

/// [`suggested_volume_name`] for each mount target of one service, in order.
/// A name already taken gets the first free `-2`, `-3`, ... suffix.
pub fn suggested_volume_names<'a>(
    service_name: &str,
    targets: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let mut taken = HashSet::new();
    targets
        .into_iter()
        .map(|target| {
            let base = suggested_volume_name(service_name, target);
            let mut name = base.clone();
            let mut suffix = 1;
            while taken.contains(&name) {
                suffix += 1;
                name = format!("{}-{}", base, suffix);
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}
