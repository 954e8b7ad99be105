//! Platform-native metadata APIs

pub mod youtube;

pub use youtube::YouTubeApiSource;
