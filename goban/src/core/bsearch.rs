/// Index of the first element strictly greater than `x` in the sorted slice
/// `arr[low..high]`, or `high` if no such element exists.
pub fn find_first_gt(arr: &[f64], x: f64, low: usize, high: usize) -> usize {
    if low >= high {
        return high;
    }
    let mid = (low + high) / 2;
    if arr[mid] > x {
        find_first_gt(arr, x, low, mid)
    } else {
        find_first_gt(arr, x, mid + 1, high)
    }
}
