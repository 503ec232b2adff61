pub mod dispatch_const;
pub mod err_const;
pub mod fs_const;
pub mod machine_const;
pub mod sys_const;

pub use err_const::VERBOSE;
pub use sys_const::{EXIT_FAILURE, EXIT_SUCCESS};
