pub mod action;
pub mod cache;
pub mod clock;
pub mod driver;
pub mod error;
pub mod layout;
pub mod notice;
pub mod pipeline;
pub mod promote;
pub mod rows;
pub mod store;
pub mod tail;

pub use action::{
    ActionCompletion, ActionInvoker, ActionRequest, ActionStatus, ActionToken, ConfirmPrompt,
    ConfirmVariant, ExecuteTicket, Invocation, PendingAction,
};
pub use cache::{
    CacheEntry, FetchFn, FetchFuture, FetchReason, PendingFetch, PollingCache, QueryKey,
    ResolveOutcome,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{FetchCompletion, FetchDriver};
pub use error::{ActionError, ValidationError};
pub use layout::{ContainerBounds, DragPhase, PersistentLayoutState, PointerDragSource};
pub use notice::{NoticeBoard, NoticeLevel, Notification};
pub use pipeline::{PageSpec, PageView, SortDirection, SortSpec, ViewRow, ViewState};
pub use promote::promote_process;
pub use rows::{LogColumn, ProcessColumn, ServiceColumn};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use tail::{LogTailer, TailContent};
