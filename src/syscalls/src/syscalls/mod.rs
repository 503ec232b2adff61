pub mod fs_calls;
pub mod sys_calls;
