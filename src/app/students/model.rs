//! 学生数据模型

pub use crate::core::model::Student;
