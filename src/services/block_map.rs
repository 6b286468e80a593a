// Block map service: block metrics with a session-local metric cursor.

use serde::Serialize;

use crate::api::MetricsApi;
use crate::error::DashboardError;
use crate::ranking::{rank_by, tier_for, BlockMetric, MetricRange, SeverityTier};
use crate::types::{join_path, BlockMetricRow, BlockMetricsResponse};

/// Fetch `map/block-metrics` under the analytics base path.
pub async fn load_block_metrics(
    api: &dyn MetricsApi,
    analytics_base_path: &str,
) -> Result<BlockMetricsResponse, DashboardError> {
    let path = join_path(analytics_base_path, "map/block-metrics");
    let json = api.get_json(&path, &[]).await?;
    serde_json::from_value(json).map_err(|e| DashboardError::Decode {
        path,
        message: e.to_string(),
    })
}

/// One row as rendered: its rank, value and tier for the selected metric.
#[derive(Debug, Clone, Serialize)]
pub struct RankedBlock<'a> {
    pub rank: usize,
    pub block_name: &'a str,
    pub value: f64,
    pub tier: SeverityTier,
    pub color: &'static str,
}

/// Rows plus the currently selected metric. Ranking and tiers are
/// recomputed from the rows on every call, never cached.
#[derive(Debug, Clone, Default)]
pub struct BlockMetricView {
    rows: Vec<BlockMetricRow>,
    selected: BlockMetric,
}

impl BlockMetricView {
    pub fn new(rows: Vec<BlockMetricRow>) -> Self {
        Self {
            rows,
            selected: BlockMetric::default(),
        }
    }

    pub fn rows(&self) -> &[BlockMetricRow] {
        &self.rows
    }

    pub fn selected(&self) -> BlockMetric {
        self.selected
    }

    pub fn select(&mut self, metric: BlockMetric) {
        self.selected = metric;
    }

    pub fn range(&self) -> Option<MetricRange> {
        MetricRange::of(&self.rows, self.selected)
    }

    pub fn ranked(&self) -> Vec<RankedBlock<'_>> {
        let Some(range) = self.range() else {
            return Vec::new();
        };
        rank_by(&self.rows, self.selected)
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let value = self.selected.value(row);
                let tier = tier_for(value, &range);
                RankedBlock {
                    rank: i + 1,
                    block_name: &row.block_name,
                    value,
                    tier,
                    color: tier.color(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::fake::FakeApi;

    #[tokio::test]
    async fn test_load_block_metrics_decodes_response() {
        let api = FakeApi::new();
        api.reply(
            "/api/analytics/map/block-metrics",
            json!({
                "blocks": [
                    { "block_name": "Haveli", "shi_score": 81.9, "apaar_rate": 77.0, "rag_status": "green" },
                    { "block_name": "Velhe", "shi_score": 58.1, "apaar_rate": 64.5, "rag_status": "red" }
                ],
                "total_blocks": 2,
                "metric_ranges": { "shi": { "min": 58.1, "max": 81.9 } }
            }),
        );

        let resp = load_block_metrics(&api, "/api/analytics").await.unwrap();
        assert_eq!(resp.total_blocks, 2);
        assert_eq!(resp.blocks[1].block_name, "Velhe");
        assert_eq!(resp.metric_ranges["shi"].max, 81.9);
    }

    #[tokio::test]
    async fn test_load_block_metrics_bad_shape_is_decode_error() {
        let api = FakeApi::new();
        api.reply("/api/analytics/map/block-metrics", json!({ "blocks": "nope" }));
        let err = load_block_metrics(&api, "/api/analytics").await.unwrap_err();
        assert!(matches!(err, DashboardError::Decode { .. }));
    }

    #[test]
    fn test_selection_change_reranks() {
        let rows = vec![
            BlockMetricRow {
                block_name: "Haveli".to_string(),
                shi_score: 81.9,
                teacher_quality: 4.0,
                ..Default::default()
            },
            BlockMetricRow {
                block_name: "Velhe".to_string(),
                shi_score: 58.1,
                teacher_quality: 9.5,
                ..Default::default()
            },
        ];
        let mut view = BlockMetricView::new(rows);

        let ranked = view.ranked();
        assert_eq!(ranked[0].block_name, "Haveli");
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[0].tier, SeverityTier::Excellent);
        assert_eq!(ranked[1].tier, SeverityTier::Poor);

        view.select(BlockMetric::TeacherQuality);
        let ranked = view.ranked();
        assert_eq!(ranked[0].block_name, "Velhe");
        assert_eq!(ranked[0].value, 9.5);
    }

    #[test]
    fn test_empty_view_ranks_nothing() {
        assert!(BlockMetricView::default().ranked().is_empty());
    }
}
