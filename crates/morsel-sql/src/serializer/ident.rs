/// A quoted SQL identifier.
pub(super) struct Ident<S>(pub(super) S);

impl<S: AsRef<str>> Ident<S> {
    pub(super) fn push(&self, dst: &mut String) {
        dst.push('"');
        for ch in self.0.as_ref().chars() {
            if ch == '"' {
                dst.push('"');
            }
            dst.push(ch);
        }
        dst.push('"');
    }
}
