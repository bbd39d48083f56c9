//! `tillpoint-expenses` — shop running costs (event-sourced).

pub mod category;
pub mod expense;

pub use category::ExpenseCategory;
pub use expense::{
    DeleteExpense, Expense, ExpenseCommand, ExpenseDeleted, ExpenseDetails, ExpenseEvent,
    ExpenseId, ExpenseRecorded, ExpenseUpdated, RecordExpense, UpdateExpense,
};
