/// Orders items by display name the way the file picker lists them:
/// case-insensitive, falling back to a case-sensitive compare on ties.
/// The sort is stable, so identical names keep their relative order.
pub fn sort_by_display_name<T>(items: &mut [T], name: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| {
        let (a, b) = (name(a), name(b));
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
}
