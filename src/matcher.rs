use crate::record::Record;
use std::borrow::Cow;
use std::fmt::Debug;
use std::sync::Arc;

pub const DEFAULT_MATCH_FIELD: &str = "id";

pub type MatchFn<R> = dyn Fn(&R, &R) -> bool + Send + Sync;

/// Decides whether a cached record "is" a given target record.
#[derive(Clone)]
pub enum Matcher<R> {
    /// Both records must carry the field and the values must be equal.
    Field(Cow<'static, str>),
    /// Every listed field must be present on both sides and pairwise equal.
    Fields(Vec<Cow<'static, str>>),
    Custom(Arc<MatchFn<R>>),
}

impl<R> Matcher<R>
where
    R: Record,
{
    pub fn by_field(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Field(name.into())
    }

    pub fn by_fields<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Cow<'static, str>>,
    {
        Self::Fields(names.into_iter().map(Into::into).collect())
    }

    pub fn custom(f: impl Fn(&R, &R) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    pub fn matches(&self, cached: &R, target: &R) -> bool {
        match self {
            Self::Field(name) => field_eq(cached, target, name),
            // An empty field list would match everything with everything.
            Self::Fields(names) => !names.is_empty() && names.iter().all(|name| field_eq(cached, target, name)),
            Self::Custom(f) => f(cached, target),
        }
    }
}

#[inline]
fn field_eq<R: Record>(a: &R, b: &R, name: &str) -> bool {
    match (a.field(name), b.field(name)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

impl<R> Default for Matcher<R> {
    fn default() -> Self {
        Self::Field(Cow::Borrowed(DEFAULT_MATCH_FIELD))
    }
}

impl<R> Debug for Matcher<R> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(name) => fmt.debug_tuple("Matcher::Field").field(name).finish(),
            Self::Fields(names) => fmt.debug_tuple("Matcher::Fields").field(names).finish(),
            Self::Custom(_) => fmt.write_str("Matcher::Custom(..)"),
        }
    }
}
