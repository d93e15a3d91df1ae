//! Borrow model and its lifecycle
//!
//! A borrow is created ACTIVE at checkout and becomes RETURNED exactly once.
//! OVERDUE is never stored: an ACTIVE borrow read after its due date is
//! reported as OVERDUE.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum BorrowStatus {
    Active,
    Returned,
    Overdue,
}

impl BorrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowStatus::Active => "ACTIVE",
            BorrowStatus::Returned => "RETURNED",
            BorrowStatus::Overdue => "OVERDUE",
        }
    }
}

impl std::str::FromStr for BorrowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(BorrowStatus::Active),
            "RETURNED" => Ok(BorrowStatus::Returned),
            "OVERDUE" => Ok(BorrowStatus::Overdue),
            _ => Err(format!("Invalid borrow status: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for BorrowStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for BorrowStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for BorrowStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Borrow record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Borrow {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: BorrowStatus,
}

impl Borrow {
    /// Status as seen on `today`
    pub fn status_on(&self, today: NaiveDate) -> BorrowStatus {
        match self.status {
            BorrowStatus::Returned => BorrowStatus::Returned,
            BorrowStatus::Active | BorrowStatus::Overdue if today > self.due_date => {
                BorrowStatus::Overdue
            }
            _ => BorrowStatus::Active,
        }
    }

    /// Copy of this record carrying the status derived for `today`
    pub fn as_of(mut self, today: NaiveDate) -> Self {
        self.status = self.status_on(today);
        self
    }

    pub fn is_returned(&self) -> bool {
        self.status == BorrowStatus::Returned
    }

    /// Fails if the borrow can no longer be returned
    pub fn ensure_returnable(&self) -> AppResult<()> {
        if self.is_returned() {
            return Err(AppError::BusinessRule(format!(
                "Borrow {} has already been returned",
                self.id
            )));
        }
        Ok(())
    }

    /// ACTIVE|OVERDUE -> RETURNED
    pub fn mark_returned(&mut self, today: NaiveDate) -> AppResult<()> {
        self.ensure_returnable()?;
        self.return_date = Some(today);
        self.status = BorrowStatus::Returned;
        Ok(())
    }
}

/// Borrow about to be created by a checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBorrow {
    pub user_id: i64,
    pub book_id: i64,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
}

impl NewBorrow {
    pub fn checkout(user_id: i64, book_id: i64, today: NaiveDate, loan_days: u32) -> AppResult<Self> {
        let due_date = today
            .checked_add_days(Days::new(u64::from(loan_days)))
            .ok_or_else(|| AppError::Internal("Due date out of range".to_string()))?;
        Ok(Self {
            user_id,
            book_id,
            borrow_date: today,
            due_date,
        })
    }

    pub fn into_borrow(self, id: i64) -> Borrow {
        Borrow {
            id,
            user_id: self.user_id,
            book_id: self.book_id,
            borrow_date: self.borrow_date,
            due_date: self.due_date,
            return_date: None,
            status: BorrowStatus::Active,
        }
    }
}
