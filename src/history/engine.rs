//! First-match scan over a rate group's historical dataset.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, warn};

use super::record::HistoricalRecord;
use super::HistoryError;
use crate::metrics;

/// Scans per-rate-group dataset files for a matching prior shipment.
#[derive(Debug, Clone)]
pub struct HistoryMatcher {
    dir: PathBuf,
}

impl HistoryMatcher {
    /// Create a matcher over the datasets in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Dataset directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Find the first record for `service` to `postal_prefix` at `ceil(weight)`.
    ///
    /// # Arguments
    /// * `rate_group`: selects the dataset file (file stem equals rate group)
    /// * `service`: predicted carrier service label
    /// * `postal_prefix`: first three digits of the receiver postal code
    /// * `weight`: aggregate rated weight, rounded up before comparison
    ///
    /// # Returns
    /// - `Ok(Some(record))`: first match in file order
    /// - `Ok(None)`: dataset read, no row matched
    /// - `Err(HistoryError)`: dataset missing or unreadable
    pub async fn find_match(
        &self,
        rate_group: &str,
        service: &str,
        postal_prefix: &str,
        weight: f64,
    ) -> Result<Option<HistoricalRecord>, HistoryError> {
        let start = Instant::now();
        let path = self.dataset_path(rate_group).await?;
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| HistoryError::Io {
                path: path.display().to_string(),
                source,
            })?;

        let target = weight.ceil();
        let mut skipped = 0usize;
        let mut found = None;
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let Some(record) = HistoricalRecord::parse_line(line) else {
                if line_no > 0 {
                    skipped += 1;
                }
                continue;
            };
            if record.carrier_service_name == service
                && record.postal_prefix == postal_prefix
                && (record.rated_weight - target).abs() < f64::EPSILON
            {
                found = Some(record);
                break;
            }
        }

        if skipped > 0 {
            warn!(path = %path.display(), skipped, "skipped malformed historical rows");
        }
        metrics::record_stage_duration("history", start.elapsed());
        debug!(
            rate_group,
            service,
            postal_prefix,
            weight = target,
            matched = found.is_some(),
            "historical scan finished"
        );
        Ok(found)
    }

    async fn dataset_path(&self, rate_group: &str) -> Result<PathBuf, HistoryError> {
        let missing = || HistoryError::DatasetMissing {
            rate_group: rate_group.to_string(),
            dir: self.dir.display().to_string(),
        };
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(missing()),
            Err(source) => {
                return Err(HistoryError::Io {
                    path: self.dir.display().to_string(),
                    source,
                })
            }
        };

        let mut candidates = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|source| HistoryError::Io {
                path: self.dir.display().to_string(),
                source,
            })?;
            let Some(entry) = entry else { break };
            let path = entry.path();
            if path.file_stem().and_then(|s| s.to_str()) != Some(rate_group) {
                continue;
            }
            let file_type = entry.file_type().await.map_err(|source| HistoryError::Io {
                path: path.display().to_string(),
                source,
            })?;
            if file_type.is_file() {
                candidates.push(path);
            }
        }
        // Directory order is unspecified; pick deterministically.
        candidates.sort();
        candidates.into_iter().next().ok_or_else(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASET: &str = "\
id,rateGroup,carrierServiceName,postalPrefix,totalCost,ratedWeight,ratedWeightUOM,shipDay,commitDeliveryDay,commitDeliveryDate,commitTransitDays,residential,signatureRequired,adultSignatureRequired
1,GROUND,Express,902,30.00,3,LB,MON,TUE,2024-05-07,1,True,False,False
2,GROUND,Ground,902,12.50,3,LB,MON,THU,2024-05-09,3,True,False,False

this line is junk
3,GROUND,Ground,902,99.99,3,LB,TUE,FRI,2024-05-10,3,True,False,False
4,GROUND,Ground,21,8.00,2,LB,MON,WED,2024-05-08,2,False,False,False
";

    fn matcher() -> (tempfile::TempDir, HistoryMatcher) {
        let dir = tempfile::tempdir().expect("test: tempdir");
        std::fs::write(dir.path().join("GROUND.csv"), DATASET).expect("test: write");
        let m = HistoryMatcher::new(dir.path());
        (dir, m)
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let (_dir, m) = matcher();
        let r = m
            .find_match("GROUND", "Ground", "902", 2.3)
            .await
            .expect("test: scan")
            .expect("test: match");
        assert_eq!(r.id, "2");
        assert!((r.total_cost - 12.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_match_is_deterministic() {
        let (_dir, m) = matcher();
        for _ in 0..5 {
            let r = m
                .find_match("GROUND", "Ground", "902", 2.01)
                .await
                .expect("test: scan")
                .expect("test: match");
            assert_eq!(r.id, "2");
        }
    }

    #[tokio::test]
    async fn test_weight_is_ceiling_rounded() {
        let (_dir, m) = matcher();
        let exact = m.find_match("GROUND", "Ground", "902", 3.0).await.expect("test: scan");
        assert!(exact.is_some());
        let over = m.find_match("GROUND", "Ground", "902", 3.01).await.expect("test: scan");
        assert!(over.is_none());
    }

    #[tokio::test]
    async fn test_padded_prefix_matches() {
        let (_dir, m) = matcher();
        let r = m
            .find_match("GROUND", "Ground", "021", 1.5)
            .await
            .expect("test: scan")
            .expect("test: match");
        assert_eq!(r.id, "4");
    }

    #[tokio::test]
    async fn test_no_match_is_none() {
        let (_dir, m) = matcher();
        let r = m.find_match("GROUND", "Freight", "902", 3.0).await.expect("test: scan");
        assert!(r.is_none());
    }

    #[tokio::test]
    async fn test_directory_named_like_rate_group_is_skipped() {
        let (dir, m) = matcher();
        // "GROUND" sorts before "GROUND.csv" and shares its stem.
        std::fs::create_dir(dir.path().join("GROUND")).expect("test: mkdir");
        let r = m
            .find_match("GROUND", "Ground", "902", 3.0)
            .await
            .expect("test: scan")
            .expect("test: match");
        assert_eq!(r.id, "2");
    }

    #[tokio::test]
    async fn test_missing_dataset_is_error() {
        let (_dir, m) = matcher();
        let err = m
            .find_match("EXPRESS", "Ground", "902", 3.0)
            .await
            .expect_err("test: must fail");
        assert!(matches!(err, HistoryError::DatasetMissing { .. }));
    }

    #[tokio::test]
    async fn test_missing_directory_is_dataset_missing() {
        let m = HistoryMatcher::new("/definitely/not/here");
        let err = m
            .find_match("GROUND", "Ground", "902", 3.0)
            .await
            .expect_err("test: must fail");
        assert!(matches!(err, HistoryError::DatasetMissing { .. }));
    }
}
