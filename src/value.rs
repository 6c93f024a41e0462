use crate::matcher::Matcher;
use crate::optimistic::Operation;
use crate::record::Record;
use moka::ops::compute::Op;
use serde_json::Value;

/// A value stored at a cache address.
///
/// A missing address is represented by `Option::None` wherever a value may be absent.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue<R> {
    Single(R),
    List(Vec<R>),
    Paginated(Paginated<R>),
    /// Anything the engine doesn't know how to transform: counters, aggregates, raw payloads.
    Other(Value),
}

/// Infinite-query style container: ordered pages plus the parameters each page was fetched with.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginated<R> {
    pub pages:       Vec<Page<R>>,
    pub page_params: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Page<R> {
    Items(Vec<R>),
    /// A page that isn't a list. Passed through untouched by every transformation.
    Opaque(Value),
}

impl<R> Paginated<R> {
    pub fn new(pages: Vec<Vec<R>>) -> Self {
        Self {
            pages:       pages.into_iter().map(Page::Items).collect(),
            page_params: Vec::new(),
        }
    }

    pub fn with_page_params(mut self, params: Vec<Value>) -> Self {
        self.page_params = params;
        self
    }

    /// Iterate over the records of all list pages in order.
    pub fn items(&self) -> impl Iterator<Item = &R> {
        self.pages.iter().flat_map(|page| match page {
            Page::Items(items) => items.as_slice(),
            Page::Opaque(_) => &[],
        })
    }

    fn map_pages(&self, mut f: impl FnMut(usize, &[R]) -> Vec<R>) -> Self
    where
        R: Clone,
    {
        Self {
            pages:       self
                .pages
                .iter()
                .enumerate()
                .map(|(idx, page)| match page {
                    Page::Items(items) => Page::Items(f(idx, items)),
                    opaque => opaque.clone(),
                })
                .collect(),
            page_params: self.page_params.clone(),
        }
    }
}

impl<R> CacheValue<R>
where
    R: Record,
{
    /// Returns true if any record held by this value matches `target`.
    pub fn contains(&self, target: &R, matcher: &Matcher<R>) -> bool {
        match self {
            Self::Single(record) => matcher.matches(record, target),
            Self::List(items) => items.iter().any(|r| matcher.matches(r, target)),
            Self::Paginated(p) => p.items().any(|r| matcher.matches(r, target)),
            Self::Other(_) => false,
        }
    }

    /// Compute what an optimistic `operation` with `record` does to the `current` value of an address.
    ///
    /// Never modifies `current`; a changed address always gets a freshly built value. [`Op::Nop`] means the shape
    /// doesn't support the operation and the address must be left as it is.
    pub fn transformed(current: Option<&Self>, operation: Operation, record: &R, matcher: &Matcher<R>) -> Op<Self> {
        match (current, operation) {
            (None, Operation::Add) => Op::Put(Self::List(vec![record.clone()])),
            (None, _) => Op::Nop,

            (Some(Self::Paginated(p)), Operation::Add) => Op::Put(Self::Paginated(p.map_pages(|idx, items| {
                if idx == 0 {
                    std::iter::once(record.clone()).chain(items.iter().cloned()).collect()
                }
                else {
                    items.to_vec()
                }
            }))),
            (Some(Self::Paginated(p)), Operation::Update) => {
                Op::Put(Self::Paginated(p.map_pages(|_, items| merge_matching(items, record, matcher))))
            }
            (Some(Self::Paginated(p)), Operation::Remove) => {
                Op::Put(Self::Paginated(p.map_pages(|_, items| drop_matching(items, record, matcher))))
            }

            (Some(Self::List(items)), Operation::Add) => {
                let mut added = Vec::with_capacity(items.len() + 1);
                added.extend(items.iter().cloned());
                added.push(record.clone());
                Op::Put(Self::List(added))
            }
            (Some(Self::List(items)), Operation::Update) => Op::Put(Self::List(merge_matching(items, record, matcher))),
            (Some(Self::List(items)), Operation::Remove) => Op::Put(Self::List(drop_matching(items, record, matcher))),

            (Some(Self::Single(cached)), Operation::Update) if matcher.matches(cached, record) => {
                Op::Put(Self::Single(cached.merged_with(record)))
            }
            (Some(Self::Single(cached)), Operation::Remove) if matcher.matches(cached, record) => Op::Remove,
            (Some(Self::Single(_)), _) => Op::Nop,

            (Some(Self::Other(_)), _) => Op::Nop,
        }
    }

    /// Compute the value of an address after every record matching `target` is swapped for `replacement` verbatim.
    ///
    /// An address that doesn't hold `target` is left as it is.
    pub fn replaced(current: Option<&Self>, target: &R, replacement: &R, matcher: &Matcher<R>) -> Op<Self> {
        let Some(current) = current.filter(|value| value.contains(target, matcher))
        else {
            return Op::Nop;
        };

        let swap = |items: &[R]| -> Vec<R> {
            items
                .iter()
                .map(|item| {
                    if matcher.matches(item, target) {
                        replacement.clone()
                    }
                    else {
                        item.clone()
                    }
                })
                .collect()
        };

        match current {
            Self::Paginated(p) => Op::Put(Self::Paginated(p.map_pages(|_, items| swap(items)))),
            Self::List(items) => Op::Put(Self::List(swap(items))),
            Self::Single(_) => Op::Put(Self::Single(replacement.clone())),
            Self::Other(_) => Op::Nop,
        }
    }
}

fn merge_matching<R: Record>(items: &[R], record: &R, matcher: &Matcher<R>) -> Vec<R> {
    items
        .iter()
        .map(|item| {
            if matcher.matches(item, record) {
                item.merged_with(record)
            }
            else {
                item.clone()
            }
        })
        .collect()
}

fn drop_matching<R: Record>(items: &[R], record: &R, matcher: &Matcher<R>) -> Vec<R> {
    items.iter().filter(|item| !matcher.matches(item, record)).cloned().collect()
}
