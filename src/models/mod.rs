pub mod credentials;
pub mod criteria;
pub mod listing;

pub use credentials::Credentials;
pub use criteria::{
    format_date, parse_date, today, AnnouncementDateKind, CaseNumber, DateRange, SearchCriteria, SearchRequest,
};
pub use listing::{
    parse_page_indicator, Banner, BannerKind, PageCursor, RowSnapshot, SearchResult, SelectionState,
};
