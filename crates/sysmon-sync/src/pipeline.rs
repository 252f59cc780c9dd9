use crate::store::{KeyValueStore, StoreError};
use std::cmp::Ordering;
use std::sync::Arc;

pub const PAGE_SIZE_CHOICES: [usize; 5] = [10, 25, 50, 100, 0];
pub const DEFAULT_PAGE_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Asc => "▲",
            SortDirection::Desc => "▼",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec<F> {
    pub field: F,
    pub direction: SortDirection,
}

impl<F: Copy + PartialEq> SortSpec<F> {
    pub fn asc(field: F) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    /// Header-click semantics: the same field flips direction, a new field
    /// starts ascending.
    pub fn clicked(current: Option<Self>, field: F) -> Self {
        match current {
            Some(spec) if spec.field == field => Self {
                field,
                direction: spec.direction.toggled(),
            },
            _ => Self::asc(field),
        }
    }
}

/// `page_size == 0` means unpaginated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub page_size: usize,
    pub page_index: usize,
}

impl PageSpec {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            page_index: 0,
        }
    }

    pub fn page_count(&self, len: usize) -> usize {
        if self.page_size == 0 || len == 0 {
            return 1;
        }
        len.div_ceil(self.page_size)
    }
}

pub trait ViewRow {
    type Field: Copy + Eq;

    fn search_fields(&self) -> Vec<&str>;

    fn compare_by(&self, other: &Self, field: Self::Field) -> Ordering;

    /// Rows without a value for `field` go after every row that has one,
    /// whichever way the column is sorted.
    fn sorts_last(&self, _field: Self::Field) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageView<'a, R> {
    pub rows: Vec<&'a R>,
    pub filtered_len: usize,
    pub page_index: usize,
    pub page_count: usize,
}

pub fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

pub fn compare_optional<T: Ord>(a: Option<&T>, b: Option<&T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn filter_rows<'a, R: ViewRow>(collection: &'a [R], filter_text: &str) -> Vec<&'a R> {
    if filter_text.is_empty() {
        return collection.iter().collect();
    }
    let needle = filter_text.to_lowercase();
    collection
        .iter()
        .filter(|row| {
            row.search_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}

pub fn sort_rows<R: ViewRow>(rows: &mut [&R], sort: SortSpec<R::Field>) {
    // slice::sort_by is stable, so ties keep collection order.
    rows.sort_by(|a, b| {
        match (a.sorts_last(sort.field), b.sorts_last(sort.field)) {
            (false, true) => return Ordering::Less,
            (true, false) => return Ordering::Greater,
            _ => {}
        }
        let ordering = a.compare_by(b, sort.field);
        match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

/// Filter, sort, then cut one page. A page index past the end falls back to
/// the first page.
pub fn run<'a, R: ViewRow>(
    collection: &'a [R],
    filter_text: &str,
    sort: Option<SortSpec<R::Field>>,
    page: PageSpec,
) -> PageView<'a, R> {
    let mut rows = filter_rows(collection, filter_text);
    if let Some(sort) = sort {
        sort_rows(&mut rows, sort);
    }

    let filtered_len = rows.len();
    let page_count = page.page_count(filtered_len);
    let page_index = if page.page_index < page_count {
        page.page_index
    } else {
        0
    };

    if page.page_size > 0 {
        let start = page_index * page.page_size;
        let end = (start + page.page_size).min(filtered_len);
        rows = rows[start..end].to_vec();
    }

    PageView {
        rows,
        filtered_len,
        page_index,
        page_count,
    }
}

/// Filter text, sort and page position of one view, with page size persisted
/// under `page_size_key`.
pub struct ViewState<F> {
    filter_text: String,
    sort: Option<SortSpec<F>>,
    page: PageSpec,
    page_size_key: String,
    store: Arc<dyn KeyValueStore>,
}

impl<F: Copy + Eq> ViewState<F> {
    pub fn restore(
        store: Arc<dyn KeyValueStore>,
        page_size_key: impl Into<String>,
        default_sort: Option<SortSpec<F>>,
    ) -> Self {
        let page_size_key = page_size_key.into();
        let page_size = store
            .get(&page_size_key)
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self {
            filter_text: String::new(),
            sort: default_sort,
            page: PageSpec::new(page_size),
            page_size_key,
            store,
        }
    }

    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    pub fn sort(&self) -> Option<SortSpec<F>> {
        self.sort
    }

    pub fn page(&self) -> PageSpec {
        self.page
    }

    pub fn set_filter_text<R>(&mut self, text: impl Into<String>, collection: &[R])
    where
        R: ViewRow<Field = F>,
    {
        self.filter_text = text.into();
        let filtered_len = filter_rows(collection, &self.filter_text).len();
        self.sync_len(filtered_len);
    }

    /// Resets to the first page when the current one no longer exists.
    pub fn sync_len(&mut self, filtered_len: usize) {
        if self.page.page_index >= self.page.page_count(filtered_len) {
            self.page.page_index = 0;
        }
    }

    pub fn click_sort(&mut self, field: F) {
        self.sort = Some(SortSpec::clicked(self.sort, field));
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), StoreError> {
        self.page = PageSpec::new(page_size);
        self.store.set(&self.page_size_key, &page_size.to_string())
    }

    pub fn cycle_page_size(&mut self) -> Result<usize, StoreError> {
        let position = PAGE_SIZE_CHOICES
            .iter()
            .position(|size| *size == self.page.page_size);
        let next = match position {
            Some(idx) => PAGE_SIZE_CHOICES[(idx + 1) % PAGE_SIZE_CHOICES.len()],
            None => DEFAULT_PAGE_SIZE,
        };
        self.set_page_size(next)?;
        Ok(next)
    }

    pub fn next_page(&mut self, filtered_len: usize) {
        if self.page.page_index + 1 < self.page.page_count(filtered_len) {
            self.page.page_index += 1;
        }
    }

    pub fn prev_page(&mut self) {
        self.page.page_index = self.page.page_index.saturating_sub(1);
    }

    /// Runs the pipeline and keeps the stored page index in range.
    pub fn apply<'a, R>(&mut self, collection: &'a [R]) -> PageView<'a, R>
    where
        R: ViewRow<Field = F>,
    {
        let view = run(collection, &self.filter_text, self.sort, self.page);
        self.page.page_index = view.page_index;
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[derive(Debug, PartialEq)]
    struct File {
        name: &'static str,
        size: u64,
        modified: Option<u32>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Column {
        Name,
        Size,
        Modified,
    }

    impl ViewRow for File {
        type Field = Column;

        fn search_fields(&self) -> Vec<&str> {
            vec![self.name]
        }

        fn compare_by(&self, other: &Self, field: Column) -> Ordering {
            match field {
                Column::Name => compare_text(self.name, other.name),
                Column::Size => self.size.cmp(&other.size),
                Column::Modified => {
                    compare_optional(self.modified.as_ref(), other.modified.as_ref())
                }
            }
        }

        fn sorts_last(&self, field: Column) -> bool {
            field == Column::Modified && self.modified.is_none()
        }
    }

    fn file(name: &'static str, size: u64, modified: Option<u32>) -> File {
        File {
            name,
            size,
            modified,
        }
    }

    fn names<'a>(view: &PageView<'a, File>) -> Vec<&'static str> {
        view.rows.iter().map(|row| row.name).collect()
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let files = vec![
            file("access.log", 1, None),
            file("error.log", 2, None),
            file("debug.txt", 3, None),
        ];
        let lower = run(&files, "log", None, PageSpec::new(0));
        let upper = run(&files, "LOG", None, PageSpec::new(0));

        assert_eq!(names(&lower), vec!["access.log", "error.log"]);
        assert_eq!(names(&lower), names(&upper));
        assert_eq!(run(&files, "", None, PageSpec::new(0)).rows.len(), 3);
    }

    #[test]
    fn whitespace_is_part_of_the_filter() {
        let files = vec![
            file("catalog", 1, None),
            file("app log", 2, None),
            file("debug.txt", 3, None),
        ];

        assert_eq!(names(&run(&files, " log", None, PageSpec::new(0))), vec!["app log"]);
        assert_eq!(names(&run(&files, " ", None, PageSpec::new(0))), vec!["app log"]);
    }

    #[test]
    fn clicking_the_same_field_twice_sorts_descending() {
        let files = vec![file("b", 0, None), file("a", 0, None), file("c", 0, None)];
        let first = SortSpec::clicked(None, Column::Name);
        let second = SortSpec::clicked(Some(first), Column::Name);
        let third = SortSpec::clicked(Some(second), Column::Name);

        assert_eq!(names(&run(&files, "", Some(first), PageSpec::new(0))), vec!["a", "b", "c"]);
        assert_eq!(names(&run(&files, "", Some(second), PageSpec::new(0))), vec!["c", "b", "a"]);
        assert_eq!(third.direction, SortDirection::Asc);
        assert_eq!(
            SortSpec::clicked(Some(second), Column::Size).direction,
            SortDirection::Asc
        );
    }

    #[test]
    fn ties_keep_collection_order_in_both_directions() {
        let files = vec![
            file("x", 5, None),
            file("y", 1, None),
            file("z", 5, None),
        ];
        let asc = run(&files, "", Some(SortSpec::asc(Column::Size)), PageSpec::new(0));
        let desc = run(
            &files,
            "",
            Some(SortSpec {
                field: Column::Size,
                direction: SortDirection::Desc,
            }),
            PageSpec::new(0),
        );
        assert_eq!(names(&asc), vec!["y", "x", "z"]);
        assert_eq!(names(&desc), vec!["x", "z", "y"]);
    }

    #[test]
    fn absent_timestamps_sort_last_either_way() {
        let files = vec![
            file("none", 0, None),
            file("old", 0, Some(1)),
            file("new", 0, Some(9)),
        ];
        let asc = run(&files, "", Some(SortSpec::asc(Column::Modified)), PageSpec::new(0));
        let desc = run(
            &files,
            "",
            Some(SortSpec {
                field: Column::Modified,
                direction: SortDirection::Desc,
            }),
            PageSpec::new(0),
        );
        assert_eq!(names(&asc), vec!["old", "new", "none"]);
        assert_eq!(names(&desc), vec!["new", "old", "none"]);
    }

    #[test]
    fn identical_inputs_give_identical_references() {
        let files = vec![file("b", 2, None), file("a", 1, None)];
        let sort = Some(SortSpec::asc(Column::Name));
        let first = run(&files, "", sort, PageSpec::new(1));
        let second = run(&files, "", sort, PageSpec::new(1));
        assert_eq!(first, second);
        assert!(std::ptr::eq(first.rows[0], second.rows[0]));
    }

    #[test]
    fn pages_split_and_out_of_range_falls_back_to_first() {
        let files: Vec<File> = ["0", "1", "2", "3", "4"]
            .into_iter()
            .map(|name| file(name, 0, None))
            .collect();
        let pages: Vec<Vec<&str>> = (0..3)
            .map(|page_index| {
                names(&run(
                    &files,
                    "",
                    None,
                    PageSpec {
                        page_size: 2,
                        page_index,
                    },
                ))
            })
            .collect();
        assert_eq!(pages, vec![vec!["0", "1"], vec!["2", "3"], vec!["4"]]);

        let narrowed = run(
            &files,
            "4",
            None,
            PageSpec {
                page_size: 2,
                page_index: 2,
            },
        );
        assert_eq!(narrowed.page_index, 0);
        assert_eq!(names(&narrowed), vec!["4"]);
    }

    #[test]
    fn view_state_resets_page_when_filter_shrinks_collection() {
        let store = Arc::new(MemoryStore::new());
        let files: Vec<File> = ["a0", "a1", "a2", "a3", "a4", "a5", "a6", "b0"]
            .into_iter()
            .map(|name| file(name, 0, None))
            .collect();
        let mut state: ViewState<Column> = ViewState::restore(store, "sysmon.pageSize.logs", None);
        state.set_page_size(2).expect("page size");
        state.next_page(files.len());
        state.next_page(files.len());
        state.next_page(files.len());
        assert_eq!(state.page().page_index, 3);

        state.set_filter_text("b", &files);
        assert_eq!(state.page().page_index, 0);
        assert_eq!(names(&state.apply(&files)), vec!["b0"]);
    }

    #[test]
    fn view_state_keeps_page_when_still_in_range() {
        let store = Arc::new(MemoryStore::new());
        let files: Vec<File> = ["a0", "a1", "a2", "a3", "x"]
            .into_iter()
            .map(|name| file(name, 0, None))
            .collect();
        let mut state: ViewState<Column> = ViewState::restore(store, "k", None);
        state.set_page_size(2).expect("page size");
        state.next_page(files.len());
        state.set_filter_text("a", &files);
        assert_eq!(state.page().page_index, 1);
    }

    #[test]
    fn page_size_is_persisted_and_resets_index() {
        let store = Arc::new(MemoryStore::with_values([("sysmon.pageSize.services", "50")]));
        let mut state: ViewState<Column> =
            ViewState::restore(store.clone(), "sysmon.pageSize.services", None);
        assert_eq!(state.page().page_size, 50);

        state.next_page(500);
        assert_eq!(state.cycle_page_size().expect("cycle"), 100);
        assert_eq!(state.page().page_index, 0);
        assert_eq!(store.get("sysmon.pageSize.services").as_deref(), Some("100"));

        assert_eq!(state.cycle_page_size().expect("cycle"), 0);
        assert_eq!(state.cycle_page_size().expect("cycle"), 10);
    }

    #[test]
    fn unpaginated_returns_everything() {
        let files: Vec<File> = (0..40).map(|_| file("f", 0, None)).collect();
        let view = run(&files, "", None, PageSpec::new(0));
        assert_eq!(view.rows.len(), 40);
        assert_eq!(view.page_count, 1);
    }
}
