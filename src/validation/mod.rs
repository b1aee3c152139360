//! Save request validation.
//!
//! Everything here runs before the engine touches the catalog or the disk:
//! - Required fields (dataset id, version tag)
//! - Version tag safety (it becomes a directory name)
//! - Annotation geometry (finite, inside `[0, 1]`) and non-empty labels
//!
//! Error-severity issues reject the request; warnings are logged and the
//! affected entry is handled as documented on its [`IssueCode`].

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use std::collections::HashMap;

use crate::assets::is_safe_segment;
use crate::error::LabelforgeError;
use crate::request::{AnnotationPayload, SaveRequest};

/// Validates a save request and returns a report of all issues found.
pub fn validate_save_request(request: &SaveRequest) -> ValidationReport {
    let mut report = ValidationReport::new();

    if request.dataset_id.is_none() {
        report.add(ValidationIssue::error(
            IssueCode::MissingDatasetId,
            "datasetId is required",
            IssueContext::Request,
        ));
    }

    match request.version_tag.as_deref() {
        None => report.add(ValidationIssue::error(
            IssueCode::MissingVersionTag,
            "versionTag is required",
            IssueContext::Request,
        )),
        Some(tag) if tag.trim().is_empty() => report.add(ValidationIssue::error(
            IssueCode::MissingVersionTag,
            "versionTag must not be blank",
            IssueContext::Request,
        )),
        Some(tag) if !is_safe_segment(tag) => report.add(ValidationIssue::error(
            IssueCode::UnsafeVersionTag,
            format!("versionTag '{tag}' may only contain letters, digits, '.', '_' and '-'"),
            IssueContext::Request,
        )),
        Some(_) => {}
    }

    validate_images(request, &mut report);

    report
}

/// Validate and turn the report into a `Result`.
pub fn ensure_valid(request: &SaveRequest) -> Result<ValidationReport, LabelforgeError> {
    let report = validate_save_request(request);
    if report.is_ok() {
        Ok(report)
    } else {
        Err(LabelforgeError::ValidationFailed {
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            report,
        })
    }
}

fn validate_images(request: &SaveRequest, report: &mut ValidationReport) {
    let mut seen: HashMap<i64, usize> = HashMap::new();

    for (index, image) in request.images.iter().enumerate() {
        match image.image_id {
            None => report.add(ValidationIssue::warning(
                IssueCode::MissingImageId,
                "entry has no imageId and will be skipped",
                IssueContext::Image { index },
            )),
            Some(id) => {
                if let Some(first) = seen.get(&id) {
                    report.add(ValidationIssue::warning(
                        IssueCode::DuplicateImageId,
                        format!(
                            "imageId {} already listed at entry #{}; entries are applied in order",
                            id, first
                        ),
                        IssueContext::Image { index },
                    ));
                } else {
                    seen.insert(id, index);
                }
            }
        }

        for (annotation, payload) in image.annotations.iter().enumerate() {
            validate_annotation(
                payload,
                IssueContext::Annotation {
                    image: index,
                    annotation,
                },
                report,
            );
        }
    }
}

fn validate_annotation(
    payload: &AnnotationPayload,
    context: IssueContext,
    report: &mut ValidationReport,
) {
    if payload.label.trim().is_empty() {
        report.add(ValidationIssue::error(
            IssueCode::EmptyLabel,
            "label must not be empty",
            context,
        ));
    }

    let bbox = payload.bbox();
    if !bbox.is_finite() {
        report.add(ValidationIssue::error(
            IssueCode::BBoxNotFinite,
            format!("non-finite coordinates {:?}", bbox.components()),
            context,
        ));
        return;
    }

    if !bbox.is_within_unit() {
        report.add(ValidationIssue::error(
            IssueCode::BBoxOutOfRange,
            format!(
                "coordinates {:?} must all lie in [0.0, 1.0]",
                bbox.components()
            ),
            context,
        ));
        return;
    }

    if !bbox.has_area() {
        report.add(ValidationIssue::warning(
            IssueCode::BBoxZeroArea,
            format!("box {}x{} has no area", bbox.width, bbox.height),
            context,
        ));
    }
}
