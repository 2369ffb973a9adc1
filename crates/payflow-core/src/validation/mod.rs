//! Validation modules

pub mod record;

pub use record::{
    check_record, RecordVerdict, MAX_AMOUNT, MAX_EMPLOYEE_NAME_LENGTH, MSG_AMOUNT_REQUIRED,
    MSG_AMOUNT_TOO_HIGH, MSG_NAME_REQUIRED, MSG_NAME_TOO_LONG, MSG_WORKER_ID_REQUIRED,
};
