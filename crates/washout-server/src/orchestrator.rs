//! Request orchestration.
//!
//! Ties the gate, the reference table and the matcher together for the two
//! entry points: analysing uploaded images and rechecking a name list the
//! user has edited. Both end in the same matching step, so the same name set
//! always produces the same results.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};
use washout_core::{dedupe_names, MatchResult, Matcher, ReferenceTable, TieBreak};
use washout_llm::{ExtractionError, ExtractionGate, StagedImage};

use crate::error::{CheckError, CheckResult, EMPTY_RECHECK_MESSAGE, NO_IMAGE_MESSAGE};

/// Matched drugs for a set of names.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    pub matched_drugs: Vec<MatchResult>,
}

/// Outcome of analysing one or more prescription images.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Extracted names confirmed against the table, deduplicated
    pub extracted_drugs: Vec<String>,
    #[serde(flatten)]
    pub report: MatchReport,
    #[serde(skip_serializing_if = "is_zero")]
    pub failed_images: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

pub struct Orchestrator {
    table: Arc<ReferenceTable>,
    gate: ExtractionGate,
    tie_break: TieBreak,
}

impl Orchestrator {
    pub fn new(table: Arc<ReferenceTable>, gate: ExtractionGate) -> Self {
        Self {
            table,
            gate,
            tie_break: TieBreak::default(),
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    fn matcher(&self) -> Matcher<'_> {
        Matcher::new(&self.table).with_tie_break(self.tie_break)
    }

    /// Extract, validate and match the drugs on a batch of images.
    ///
    /// Images are extracted concurrently through the gate, so a batch may not
    /// hold more images than the gate admits at once. If any image is turned
    /// away as busy the whole batch is a capacity error. Otherwise the batch succeeds if at least one image does, and the first
    /// failure in upload order is returned when none does.
    pub async fn analyze_images(&self, images: Vec<StagedImage>) -> CheckResult<AnalysisReport> {
        if images.is_empty() {
            return Err(CheckError::input(NO_IMAGE_MESSAGE));
        }
        let total = images.len();
        let capacity = self.gate.capacity();
        if total > capacity {
            return Err(CheckError::input(format!(
                "画像は{capacity}枚までアップロードできます"
            )));
        }

        let outcomes = join_all(images.into_iter().map(|image| self.gate.extract(image))).await;

        let mut names = Vec::new();
        let mut first_error = None;
        let mut busy = None;
        let mut failed = 0;
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(extracted) => names.extend(extracted),
                Err(e @ ExtractionError::Busy { .. }) => {
                    warn!(image_index = index, "Image turned away at the extraction gate");
                    failed += 1;
                    busy.get_or_insert(e);
                }
                Err(e) => {
                    warn!(image_index = index, error = %e, "Image extraction failed");
                    failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = busy {
            return Err(e.into());
        }
        if failed == total {
            if let Some(e) = first_error {
                return Err(e.into());
            }
        }

        let matcher = self.matcher();
        let candidates = dedupe_names(names);
        let extracted_drugs = matcher.validate_against_table(&candidates);
        let matched_drugs = matcher.match_names(&extracted_drugs);

        info!(
            images = total,
            failed_images = failed,
            candidates = candidates.len(),
            validated = extracted_drugs.len(),
            matched = matched_drugs.len(),
            "Image analysis complete"
        );

        Ok(AnalysisReport {
            extracted_drugs,
            report: MatchReport { matched_drugs },
            failed_images: failed,
        })
    }

    /// Match a user-edited name list.
    ///
    /// Entries are trimmed and blanks dropped; a list with nothing left is
    /// rejected.
    pub fn recheck_names<S: AsRef<str>>(&self, names: &[S]) -> CheckResult<MatchReport> {
        let cleaned: Vec<&str> = names
            .iter()
            .map(|n| n.as_ref().trim())
            .filter(|n| !n.is_empty())
            .collect();

        if cleaned.is_empty() {
            return Err(CheckError::input(EMPTY_RECHECK_MESSAGE));
        }

        let matched_drugs = self.matcher().match_names(&cleaned);
        info!(
            names = cleaned.len(),
            matched = matched_drugs.len(),
            "Recheck complete"
        );

        Ok(MatchReport { matched_drugs })
    }

    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    pub fn gate(&self) -> &ExtractionGate {
        &self.gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;
    use tokio::sync::Semaphore;
    use washout_core::DrugRecord;
    use washout_llm::{ExtractionResult, GateConfig, VisionExtractor};

    /// Treats the image bytes as the model's answer. "FAIL" fails the call
    /// and "HOLD" waits until the test releases it.
    struct EchoExtractor {
        release: Arc<Semaphore>,
    }

    #[async_trait]
    impl VisionExtractor for EchoExtractor {
        async fn extract_raw(&self, image: &[u8]) -> ExtractionResult<String> {
            match image {
                b"FAIL" => Err(ExtractionError::Failed("upstream 503".into())),
                b"HOLD" => {
                    let permit = self
                        .release
                        .acquire()
                        .await
                        .map_err(|e| ExtractionError::Failed(e.to_string()))?;
                    permit.forget();
                    Ok("[]".into())
                }
                _ => Ok(String::from_utf8_lossy(image).into_owned()),
            }
        }
    }

    fn table() -> Arc<ReferenceTable> {
        let table = ReferenceTable::from_records(vec![
            DrugRecord::new("アクトス錠15", "ピオグリタゾン", Some("7日間")),
            DrugRecord::new("バファリン配合錠A81", "アスピリン", Some("7日間")),
            DrugRecord::new("ロキソニン錠60mg", "ロキソプロフェン", None),
            DrugRecord::new("プラビックス錠75mg", "クロピドグレル", Some("14日間")),
        ])
        .unwrap();
        Arc::new(table)
    }

    fn orchestrator_with(release: Arc<Semaphore>) -> Orchestrator {
        let gate = ExtractionGate::new(Arc::new(EchoExtractor { release }), GateConfig::default());
        Orchestrator::new(table(), gate)
    }

    fn orchestrator() -> Orchestrator {
        orchestrator_with(Arc::new(Semaphore::new(0)))
    }

    fn stage(dir: &Path, body: &str) -> StagedImage {
        StagedImage::from_bytes(dir, body.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_analyze_validates_and_matches() {
        let dir = tempfile::tempdir().unwrap();
        let report = orchestrator()
            .analyze_images(vec![stage(
                dir.path(),
                r#"["アクトス","架空の薬","ロキソニン"]"#,
            )])
            .await
            .unwrap();

        assert_eq!(report.extracted_drugs, vec!["アクトス", "ロキソニン"]);
        assert_eq!(
            report.report.matched_drugs,
            vec![MatchResult::new("アクトス", "7日間")]
        );
        assert_eq!(report.failed_images, 0);
    }

    #[tokio::test]
    async fn test_analyze_dedupes_across_images() {
        let dir = tempfile::tempdir().unwrap();
        let report = orchestrator()
            .analyze_images(vec![
                stage(dir.path(), r#"["アクトス"]"#),
                stage(dir.path(), r#"["アクトス","バファリン"]"#),
            ])
            .await
            .unwrap();

        assert_eq!(report.extracted_drugs, vec!["アクトス", "バファリン"]);
        assert_eq!(report.report.matched_drugs.len(), 2);
    }

    #[tokio::test]
    async fn test_analyze_partial_failure() {
        let dir = tempfile::tempdir().unwrap();
        let report = orchestrator()
            .analyze_images(vec![stage(dir.path(), "FAIL"), stage(dir.path(), r#"["バファリン"]"#)])
            .await
            .unwrap();

        assert_eq!(report.failed_images, 1);
        assert_eq!(report.extracted_drugs, vec!["バファリン"]);
    }

    #[tokio::test]
    async fn test_analyze_all_failed_reports_first_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = orchestrator()
            .analyze_images(vec![stage(dir.path(), "FAIL"), stage(dir.path(), "not json")])
            .await
            .unwrap_err();

        assert!(matches!(err, CheckError::ExternalService { .. }));
    }

    #[tokio::test]
    async fn test_batch_larger_than_ceiling_rejected_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator();
        let images = ["アクトス", "バファリン", "ロキソニン", "プラビックス"]
            .iter()
            .map(|name| stage(dir.path(), &format!(r#"["{name}"]"#)))
            .collect();

        let err = orchestrator.analyze_images(images).await.unwrap_err();

        assert!(matches!(err, CheckError::Input(_)));
        assert_eq!(orchestrator.gate().in_flight(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_full_batch_at_ceiling_keeps_every_image() {
        let dir = tempfile::tempdir().unwrap();
        let report = orchestrator()
            .analyze_images(vec![
                stage(dir.path(), r#"["アクトス"]"#),
                stage(dir.path(), r#"["バファリン"]"#),
                stage(dir.path(), r#"["プラビックス"]"#),
            ])
            .await
            .unwrap();

        assert_eq!(report.failed_images, 0);
        assert_eq!(report.report.matched_drugs.len(), 3);
    }

    #[tokio::test]
    async fn test_busy_image_fails_whole_batch() {
        let dir = tempfile::tempdir().unwrap();
        let release = Arc::new(Semaphore::new(0));
        let orchestrator = Arc::new(orchestrator_with(Arc::clone(&release)));

        // Another request holds two of the three slots
        let mut held = Vec::new();
        for _ in 0..2 {
            let gate = orchestrator.gate().clone();
            let image = stage(dir.path(), "HOLD");
            held.push(tokio::spawn(async move { gate.extract(image).await }));
        }
        for _ in 0..200 {
            if orchestrator.gate().in_flight() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(orchestrator.gate().in_flight(), 2);

        let err = orchestrator
            .analyze_images(vec![
                stage(dir.path(), r#"["アクトス"]"#),
                stage(dir.path(), r#"["バファリン"]"#),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::Capacity(_)));

        release.add_permits(2);
        for handle in held {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(orchestrator.gate().in_flight(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_analyze_requires_an_image() {
        let err = orchestrator().analyze_images(Vec::new()).await.unwrap_err();
        assert!(matches!(err, CheckError::Input(ref m) if m == NO_IMAGE_MESSAGE));
    }

    #[tokio::test]
    async fn test_recheck_agrees_with_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator();
        let analysis = orchestrator
            .analyze_images(vec![stage(dir.path(), r#"["バファリン","アクトス"]"#)])
            .await
            .unwrap();

        let recheck = orchestrator
            .recheck_names(&analysis.extracted_drugs)
            .unwrap();

        assert_eq!(recheck, analysis.report);
    }

    #[test]
    fn test_recheck_trims_and_drops_blanks() {
        let report = orchestrator()
            .recheck_names(&["  アクトス ", "", "   "])
            .unwrap();
        assert_eq!(report.matched_drugs, vec![MatchResult::new("アクトス", "7日間")]);
    }

    #[test]
    fn test_recheck_empty_list() {
        let err = orchestrator().recheck_names::<&str>(&[]).unwrap_err();
        assert!(matches!(err, CheckError::Input(ref m) if m == EMPTY_RECHECK_MESSAGE));

        assert!(orchestrator().recheck_names(&[" ", ""]).is_err());
    }

    #[test]
    fn test_recheck_unknown_name() {
        let report = orchestrator().recheck_names(&["存在しない薬"]).unwrap();
        assert!(report.matched_drugs.is_empty());
    }

    #[test]
    fn test_report_serialization() {
        let report = AnalysisReport {
            extracted_drugs: vec!["アクトス".into()],
            report: MatchReport {
                matched_drugs: vec![MatchResult::new("アクトス", "7日間")],
            },
            failed_images: 0,
        };
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["extractedDrugs"][0], "アクトス");
        assert_eq!(json["matchedDrugs"][0]["productName"], "アクトス");
        assert_eq!(json["matchedDrugs"][0]["withdrawalPeriod"], "7日間");
        assert!(json.get("failedImages").is_none());
    }
}
