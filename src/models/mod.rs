pub mod book;
pub mod disc;
pub mod film;
pub mod game;
pub mod genre_limit;
pub mod item_genre;
pub mod loan;
pub mod notification_log;
pub mod patron;
pub mod reservation;
pub mod reservation_settings;
