mod format;

pub use format::{format_rating, format_release_date, truncate_title};
