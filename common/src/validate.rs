use std::sync::LazyLock;

use tracing::instrument;

use crate::mirrors::MirrorSpec;

// letters, digits, underscore and hyphen only
static DESTINATION_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[A-Za-z0-9_-]+$").expect("destination pattern must compile")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Source '{}' does not exist", .path.display())]
    MissingSource { path: std::path::PathBuf },
    #[error("Relative destination '{destination}' contains disallowed characters")]
    DisallowedDestination { destination: String },
    #[error("Repeated destination: '{destination}': {count}")]
    RepeatedDestination { destination: String, count: usize },
}

#[must_use]
pub fn is_allowed_destination(destination: &str) -> bool {
    DESTINATION_PATTERN.is_match(destination)
}

/// Check a single entry; an empty result means the entry is usable
#[instrument]
#[must_use]
pub fn validate(spec: &MirrorSpec) -> Vec<ValidationError> {
    let mut errors = vec![];
    if !spec.source.is_dir() {
        errors.push(ValidationError::MissingSource {
            path: spec.source.clone(),
        });
    }
    if !is_allowed_destination(&spec.relative_destination) {
        errors.push(ValidationError::DisallowedDestination {
            destination: spec.relative_destination.clone(),
        });
    }
    errors
}

/// Check a whole collection
///
/// Duplicate destinations are reported first, in the order each destination first appears,
/// followed by the per-entry errors in collection order.
#[must_use]
pub fn validate_all<'a, I>(specs: I) -> Vec<ValidationError>
where
    I: IntoIterator<Item = &'a MirrorSpec>,
{
    let specs: Vec<&MirrorSpec> = specs.into_iter().collect();
    let mut groups: Vec<(&str, usize)> = vec![];
    let mut index: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for spec in &specs {
        let destination = spec.relative_destination.as_str();
        match index.get(destination) {
            Some(&pos) => groups[pos].1 += 1,
            None => {
                index.insert(destination, groups.len());
                groups.push((destination, 1));
            }
        }
    }
    let mut errors: Vec<ValidationError> = groups
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|(destination, count)| ValidationError::RepeatedDestination {
            destination: destination.to_string(),
            count,
        })
        .collect();
    for spec in specs {
        errors.extend(validate(spec));
    }
    tracing::debug!("validation produced {} errors", errors.len());
    errors
}
