pub mod db;
pub mod repositories;
pub mod uploads;
