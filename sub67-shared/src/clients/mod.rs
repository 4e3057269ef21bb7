pub mod db;
pub mod email;
pub mod fcm;
pub mod rabbitmq;
