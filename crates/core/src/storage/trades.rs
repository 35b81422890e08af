use crate::domain::account::{Position, TradeRecord};
use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PurchaseOrder {
    pub ticker: String,
    pub company_name: String,
    pub quantity: i64,
    pub price: f64,
    pub risk_assessment: Option<String>,
}

#[derive(Debug, Clone)]
pub enum PurchaseOutcome {
    Completed { new_balance: f64, trade: TradeRecord },
    InsufficientFunds,
    UserNotFound,
}

/// Debits the balance, records the trade and folds it into the position in
/// one transaction. The debit is a single guarded UPDATE, so concurrent
/// purchases can never overdraw or lose an update.
pub async fn purchase(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    order: &PurchaseOrder,
) -> anyhow::Result<PurchaseOutcome> {
    anyhow::ensure!(order.quantity > 0, "quantity must be positive");
    anyhow::ensure!(
        order.price.is_finite() && order.price > 0.0,
        "price must be positive"
    );
    let total_price = order.quantity as f64 * order.price;

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    let new_balance = sqlx::query_scalar::<_, f64>(
        "UPDATE users \
         SET balance = ROUND((balance - $2)::numeric, 2)::double precision \
         WHERE id = $1 AND balance >= $2 \
         RETURNING balance",
    )
    .bind(user_id)
    .bind(total_price)
    .fetch_optional(&mut *tx)
    .await
    .context("debit balance failed")?;

    let Some(new_balance) = new_balance else {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .context("select user failed")?;
        tx.rollback().await.context("rollback failed")?;
        return Ok(if exists {
            PurchaseOutcome::InsufficientFunds
        } else {
            PurchaseOutcome::UserNotFound
        });
    };

    let trade_id = Uuid::new_v4();
    let timestamp: DateTime<Utc> = sqlx::query_scalar(
        "INSERT INTO transactions \
           (id, user_id, ticker, quantity, purchase_price, total_price, transaction_type, risk_assessment) \
         VALUES ($1, $2, $3, $4, $5, $6, 'buy', $7) \
         RETURNING created_at",
    )
    .bind(trade_id)
    .bind(user_id)
    .bind(&order.ticker)
    .bind(order.quantity)
    .bind(order.price)
    .bind(total_price)
    .bind(&order.risk_assessment)
    .fetch_one(&mut *tx)
    .await
    .context("insert transaction failed")?;

    sqlx::query(
        "INSERT INTO portfolios (user_id, ticker, company_name, quantity, average_cost) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (user_id, ticker) DO UPDATE \
           SET average_cost = (portfolios.average_cost * portfolios.quantity \
                               + EXCLUDED.average_cost * EXCLUDED.quantity) \
                              / (portfolios.quantity + EXCLUDED.quantity), \
               quantity = portfolios.quantity + EXCLUDED.quantity",
    )
    .bind(user_id)
    .bind(&order.ticker)
    .bind(&order.company_name)
    .bind(order.quantity)
    .bind(order.price)
    .execute(&mut *tx)
    .await
    .context("upsert portfolio failed")?;

    tx.commit().await.context("commit transaction failed")?;

    Ok(PurchaseOutcome::Completed {
        new_balance,
        trade: TradeRecord {
            id: trade_id,
            user_id,
            ticker: order.ticker.clone(),
            quantity: order.quantity,
            purchase_price: order.price,
            total_price,
            transaction_type: "buy".to_string(),
            risk_assessment: order.risk_assessment.clone(),
            timestamp,
        },
    })
}

pub async fn list_transactions(
    pool: &sqlx::PgPool,
    user_id: Uuid,
) -> anyhow::Result<Vec<TradeRecord>> {
    let rows = sqlx::query_as::<
        _,
        (
            Uuid,
            String,
            i64,
            f64,
            f64,
            String,
            Option<String>,
            DateTime<Utc>,
        ),
    >(
        "SELECT id, ticker, quantity, purchase_price, total_price, transaction_type, risk_assessment, created_at \
         FROM transactions \
         WHERE user_id = $1 \
         ORDER BY created_at ASC, id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("select transactions failed")?;

    Ok(rows
        .into_iter()
        .map(
            |(id, ticker, quantity, purchase_price, total_price, transaction_type, risk_assessment, timestamp)| {
                TradeRecord {
                    id,
                    user_id,
                    ticker,
                    quantity,
                    purchase_price,
                    total_price,
                    transaction_type,
                    risk_assessment,
                    timestamp,
                }
            },
        )
        .collect())
}

pub async fn list_positions(pool: &sqlx::PgPool, user_id: Uuid) -> anyhow::Result<Vec<Position>> {
    let rows = sqlx::query_as::<_, (String, String, i64, f64)>(
        "SELECT ticker, company_name, quantity, average_cost \
         FROM portfolios \
         WHERE user_id = $1 \
         ORDER BY ticker ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("select portfolio failed")?;

    Ok(rows
        .into_iter()
        .map(|(ticker, company_name, quantity, average_cost)| Position {
            ticker,
            company_name,
            quantity,
            average_cost,
        })
        .collect())
}
