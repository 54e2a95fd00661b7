use goban::timecontrols::TimeControls;

use crate::search::SearchParams;

/// Seconds the next search may spend: the clock allocator's recommendation,
/// capped by the configured hard limit, scaled by the caller's factor
/// (pondering and winning-streak throttles use factors below 1).
pub fn target_search_seconds(
    tc: &TimeControls,
    num_moves_played: usize,
    params: &SearchParams,
    search_factor: f64,
) -> f64 {
    let budget = tc.get_time(num_moves_played, params.lag_buffer);
    let capped = budget.recommended_time.min(params.max_time);
    (capped * search_factor.max(0.0)).max(0.0)
}
