pub mod access_times;
pub mod device_stats;
pub mod geo_stats;
pub mod hits_by_hour;
pub mod hits_by_minute;
pub mod referrer_stats;
pub mod unique_visitors;
pub mod url_record;
