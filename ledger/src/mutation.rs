//! Balance mutations and their single-statement SQL form.

use fxwallet_common::{within_balance_range, Currency, WalletSnapshot};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

const RETURNING: &str = "RETURNING balance_rub, balance_usd, balance_eur";

/// A change to one wallet row, applied as one atomic unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    /// Credit `amount` to `currency`.
    Deposit { currency: Currency, amount: Decimal },
    /// Debit `amount` from `currency` if the balance covers it.
    Withdraw { currency: Currency, amount: Decimal },
    /// Debit `debit` from `from` if covered and credit `credit` to `to`.
    Exchange {
        from: Currency,
        to: Currency,
        debit: Decimal,
        credit: Decimal,
    },
}

impl Mutation {
    /// Whether the update carries a sufficiency precondition.
    pub fn is_conditional(&self) -> bool {
        !matches!(self, Mutation::Deposit { .. })
    }

    /// Currency and amount guarded by the precondition, if any.
    pub fn debit_leg(&self) -> Option<(Currency, Decimal)> {
        match *self {
            Mutation::Deposit { .. } => None,
            Mutation::Withdraw { currency, amount } => Some((currency, amount)),
            Mutation::Exchange { from, debit, .. } => Some((from, debit)),
        }
    }

    /// Reject mutations that cannot be expressed as one row update.
    pub fn validate(&self) -> LedgerResult<()> {
        match *self {
            Mutation::Exchange { from, to, .. } if from == to => Err(LedgerError::SameCurrency(from)),
            _ => Ok(()),
        }
    }

    /// Apply to a committed snapshot, yielding the next committed snapshot.
    ///
    /// The caller must hold exclusive access to the row for the whole call.
    pub fn apply(&self, current: &WalletSnapshot) -> LedgerResult<WalletSnapshot> {
        self.validate()?;

        if let Some((currency, amount)) = self.debit_leg() {
            if current.balance(currency) < amount {
                return Err(LedgerError::InsufficientFunds {
                    currency,
                    requested: amount,
                });
            }
        }

        let mut next = *current;
        match *self {
            Mutation::Deposit { currency, amount } => credit_balance(&mut next, currency, amount)?,
            Mutation::Withdraw { currency, amount } => debit_balance(&mut next, currency, amount)?,
            Mutation::Exchange {
                from,
                to,
                debit,
                credit,
            } => {
                debit_balance(&mut next, from, debit)?;
                credit_balance(&mut next, to, credit)?;
            }
        }
        Ok(next)
    }

    /// Reject amounts no balance column can hold.
    pub fn check_range(&self) -> LedgerResult<()> {
        let legs = match *self {
            Mutation::Deposit { currency, amount } | Mutation::Withdraw { currency, amount } => {
                [(currency, amount), (currency, amount)]
            }
            Mutation::Exchange {
                from,
                to,
                debit,
                credit,
            } => [(from, debit), (to, credit)],
        };
        match legs.into_iter().find(|(_, amount)| !within_balance_range(*amount)) {
            Some((currency, _)) => Err(LedgerError::AmountOutOfRange { currency }),
            None => Ok(()),
        }
    }

    /// The `UPDATE ... RETURNING` statement performing this mutation.
    ///
    /// Amount placeholders come first in [`Mutation::amounts`] order; the user
    /// id is the last placeholder.
    pub fn statement(&self) -> String {
        match *self {
            Mutation::Deposit { currency, .. } => {
                let col = currency.balance_column();
                format!(
                    "UPDATE wallets SET {col} = {col} + $1, updated_at = now() \
                     WHERE user_id = $2 {RETURNING}"
                )
            }
            Mutation::Withdraw { currency, .. } => {
                let col = currency.balance_column();
                format!(
                    "UPDATE wallets SET {col} = {col} - $1, updated_at = now() \
                     WHERE user_id = $2 AND {col} >= $1 {RETURNING}"
                )
            }
            Mutation::Exchange { from, to, .. } => {
                let debit_col = from.balance_column();
                let credit_col = to.balance_column();
                format!(
                    "UPDATE wallets SET {debit_col} = {debit_col} - $1, \
                     {credit_col} = {credit_col} + $2, updated_at = now() \
                     WHERE user_id = $3 AND {debit_col} >= $1 {RETURNING}"
                )
            }
        }
    }

    /// Amounts bound to the statement placeholders, in order.
    pub fn amounts(&self) -> Vec<Decimal> {
        match *self {
            Mutation::Deposit { amount, .. } | Mutation::Withdraw { amount, .. } => vec![amount],
            Mutation::Exchange { debit, credit, .. } => vec![debit, credit],
        }
    }
}

fn credit_balance(next: &mut WalletSnapshot, currency: Currency, amount: Decimal) -> LedgerResult<()> {
    let balance = next.balance_mut(currency);
    *balance = balance
        .checked_add(amount)
        .filter(|b| within_balance_range(*b))
        .ok_or(LedgerError::AmountOutOfRange { currency })?;
    Ok(())
}

fn debit_balance(next: &mut WalletSnapshot, currency: Currency, amount: Decimal) -> LedgerResult<()> {
    let balance = next.balance_mut(currency);
    *balance = balance
        .checked_sub(amount)
        .ok_or(LedgerError::AmountOutOfRange { currency })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn wallet(rub: Decimal, usd: Decimal, eur: Decimal) -> WalletSnapshot {
        WalletSnapshot::new(rub, usd, eur)
    }

    #[test]
    fn test_withdraw_over_balance_is_rejected() {
        let current = wallet(dec!(500), dec!(0), dec!(0));
        let mutation = Mutation::Withdraw {
            currency: Currency::Rub,
            amount: dec!(600),
        };

        let err = mutation.apply(&current).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                currency: Currency::Rub,
                ..
            }
        ));
    }

    #[test]
    fn test_withdraw_whole_balance_leaves_zero() {
        let current = wallet(dec!(0), dec!(25.50), dec!(0));
        let mutation = Mutation::Withdraw {
            currency: Currency::Usd,
            amount: dec!(25.50),
        };

        let next = mutation.apply(&current).unwrap();
        assert_eq!(next.balance_usd, dec!(0));
    }

    #[test]
    fn test_exchange_moves_both_legs() {
        let current = wallet(dec!(1000), dec!(0), dec!(0));
        let mutation = Mutation::Exchange {
            from: Currency::Rub,
            to: Currency::Usd,
            debit: dec!(1000),
            credit: dec!(13.00),
        };

        let next = mutation.apply(&current).unwrap();
        assert_eq!(next, wallet(dec!(0), dec!(13.00), dec!(0)));
    }

    #[test]
    fn test_deposit_past_column_limit_is_rejected() {
        let current = wallet(dec!(0), dec!(999999999999999999), dec!(0));
        let mutation = Mutation::Deposit {
            currency: Currency::Usd,
            amount: dec!(1),
        };

        assert!(matches!(
            mutation.apply(&current),
            Err(LedgerError::AmountOutOfRange {
                currency: Currency::Usd
            })
        ));
    }

    #[test]
    fn test_decimal_overflow_is_an_error() {
        let current = wallet(dec!(70000000000000000000000000000), dec!(0), dec!(0));
        let mutation = Mutation::Deposit {
            currency: Currency::Rub,
            amount: dec!(70000000000000000000000000000),
        };

        assert!(matches!(
            mutation.apply(&current),
            Err(LedgerError::AmountOutOfRange { .. })
        ));
        assert!(matches!(
            mutation.check_range(),
            Err(LedgerError::AmountOutOfRange {
                currency: Currency::Rub
            })
        ));
    }

    #[test]
    fn test_exchange_credit_leg_is_range_checked() {
        let mutation = Mutation::Exchange {
            from: Currency::Rub,
            to: Currency::Eur,
            debit: dec!(10),
            credit: dec!(1000000000000000000),
        };

        assert!(matches!(
            mutation.check_range(),
            Err(LedgerError::AmountOutOfRange {
                currency: Currency::Eur
            })
        ));
    }

    #[test]
    fn test_exchange_same_currency_is_rejected() {
        let mutation = Mutation::Exchange {
            from: Currency::Eur,
            to: Currency::Eur,
            debit: dec!(1),
            credit: dec!(1),
        };

        assert!(matches!(
            mutation.validate(),
            Err(LedgerError::SameCurrency(Currency::Eur))
        ));
    }

    #[test]
    fn test_deposit_statement_is_unconditional() {
        let mutation = Mutation::Deposit {
            currency: Currency::Usd,
            amount: dec!(10),
        };

        assert_eq!(
            mutation.statement(),
            "UPDATE wallets SET balance_usd = balance_usd + $1, updated_at = now() \
             WHERE user_id = $2 RETURNING balance_rub, balance_usd, balance_eur"
        );
        assert!(!mutation.is_conditional());
        assert_eq!(mutation.amounts(), vec![dec!(10)]);
    }

    #[test]
    fn test_withdraw_statement_guards_balance() {
        let mutation = Mutation::Withdraw {
            currency: Currency::Rub,
            amount: dec!(10),
        };

        let sql = mutation.statement();
        assert!(sql.contains("SET balance_rub = balance_rub - $1"));
        assert!(sql.contains("WHERE user_id = $2 AND balance_rub >= $1"));
        assert!(mutation.is_conditional());
    }

    #[test]
    fn test_exchange_statement_is_one_update() {
        let mutation = Mutation::Exchange {
            from: Currency::Eur,
            to: Currency::Rub,
            debit: dec!(5),
            credit: dec!(450),
        };

        let sql = mutation.statement();
        assert_eq!(sql.matches("UPDATE").count(), 1);
        assert!(sql.contains("balance_eur = balance_eur - $1"));
        assert!(sql.contains("balance_rub = balance_rub + $2"));
        assert!(sql.contains("WHERE user_id = $3 AND balance_eur >= $1"));
        assert_eq!(mutation.amounts(), vec![dec!(5), dec!(450)]);
    }
}
