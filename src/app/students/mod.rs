//! 学生记录只读接口

pub mod handler;
pub mod model;
pub mod service;
