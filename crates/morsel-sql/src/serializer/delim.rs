/// Appends `items` to `dst`, comma-separated.
pub(super) fn comma<T>(
    dst: &mut String,
    items: impl IntoIterator<Item = T>,
    mut each: impl FnMut(&mut String, T),
) {
    let mut first = true;
    for item in items {
        if !first {
            dst.push_str(", ");
        }
        first = false;
        each(dst, item);
    }
}
