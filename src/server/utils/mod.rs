pub mod m3u8_utils;
pub mod url_utils;
