use super::models::{MarketMetrics, SoldItem};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sell-through rate and recommended resale price.
///
/// The recommended price is a plain mean of every sold item with a readable
/// price. There is no outlier trimming, so a single lot sale or a mislabeled
/// accessory can pull it noticeably.
pub fn compute_metrics(active_count: usize, sold_count: u64, sold_items: &[SoldItem]) -> MarketMetrics {
    let sell_through_rate_percent = if active_count == 0 {
        0.0
    } else {
        round2(sold_count as f64 / active_count as f64 * 100.0)
    };

    let prices: Vec<f64> = sold_items.iter().filter_map(SoldItem::amount).collect();
    let recommended_price = if prices.is_empty() {
        None
    } else {
        Some(round2(prices.iter().sum::<f64>() / prices.len() as f64))
    };

    MarketMetrics {
        sell_through_rate_percent,
        recommended_price,
    }
}
