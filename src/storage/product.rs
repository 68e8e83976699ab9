//! 外部产品库（客户 / 订阅 / 预订 / 体验）
//!
//! 查询工具只读访问；insert_* 辅助方法用于测试与演示数据。
//! 数据生成本身在系统边界之外，这里只提供结构化记录的查询接口。

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::storage::StorageError;

/// 订阅记录
#[derive(Clone, Debug)]
pub struct SubscriptionRecord {
    pub tier: String,
    pub status: String,
    pub monthly_quota: i64,
    pub started_at: DateTime<Utc>,
}

/// 预订记录（已联结体验标题）
#[derive(Clone, Debug)]
pub struct ReservationRecord {
    pub reservation_id: String,
    pub experience_title: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// 体验记录
#[derive(Clone, Debug)]
pub struct ExperienceRecord {
    pub experience_id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub happens_at: String,
    pub slots_available: i64,
    pub is_premium: bool,
}

/// 客户档案：基本信息 + 订阅 + 预订计数
#[derive(Clone, Debug)]
pub struct CustomerProfile {
    pub customer_id: String,
    pub full_name: String,
    pub email: String,
    pub is_blocked: bool,
    pub subscription: Option<SubscriptionRecord>,
    pub reservation_total: usize,
    pub reservation_active: usize,
}

/// 产品库
pub struct ProductStore {
    conn: Mutex<Connection>,
}

impl ProductStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::bootstrap(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn bootstrap(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS customers (
                customer_id TEXT PRIMARY KEY,
                full_name   TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                is_blocked  INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS subscriptions (
                customer_id   TEXT PRIMARY KEY REFERENCES customers (customer_id),
                tier          TEXT NOT NULL,
                status        TEXT NOT NULL,
                monthly_quota INTEGER NOT NULL,
                started_at    TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS experiences (
                experience_id   TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL,
                location        TEXT NOT NULL,
                happens_at      TEXT NOT NULL,
                slots_available INTEGER NOT NULL,
                is_premium      INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS reservations (
                reservation_id TEXT PRIMARY KEY,
                customer_id    TEXT NOT NULL REFERENCES customers (customer_id),
                experience_id  TEXT NOT NULL REFERENCES experiences (experience_id),
                status         TEXT NOT NULL,
                created_at     TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn load_profile(
        conn: &Connection,
        row: (String, String, String, bool),
    ) -> Result<CustomerProfile, rusqlite::Error> {
        let (customer_id, full_name, email, is_blocked) = row;

        let subscription = conn
            .query_row(
                "SELECT tier, status, monthly_quota, started_at
                 FROM subscriptions WHERE customer_id = ?1",
                params![customer_id],
                |row| {
                    Ok(SubscriptionRecord {
                        tier: row.get(0)?,
                        status: row.get(1)?,
                        monthly_quota: row.get(2)?,
                        started_at: row.get(3)?,
                    })
                },
            )
            .optional()?;

        let reservation_total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM reservations WHERE customer_id = ?1",
            params![customer_id],
            |row| row.get(0),
        )?;
        let reservation_active: i64 = conn.query_row(
            "SELECT COUNT(*) FROM reservations WHERE customer_id = ?1 AND status = 'reserved'",
            params![customer_id],
            |row| row.get(0),
        )?;

        Ok(CustomerProfile {
            customer_id,
            full_name,
            email,
            is_blocked,
            subscription,
            reservation_total: reservation_total as usize,
            reservation_active: reservation_active as usize,
        })
    }

    pub fn customer_by_id(&self, customer_id: &str) -> Result<Option<CustomerProfile>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let row = conn
            .query_row(
                "SELECT customer_id, full_name, email, is_blocked FROM customers
                 WHERE customer_id = ?1",
                params![customer_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, bool>(3)?,
                    ))
                },
            )
            .optional()?;
        row.map(|r| Self::load_profile(&conn, r)).transpose().map_err(Into::into)
    }

    pub fn customer_by_email(&self, email: &str) -> Result<Option<CustomerProfile>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let row = conn
            .query_row(
                "SELECT customer_id, full_name, email, is_blocked FROM customers
                 WHERE email = ?1",
                params![email],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, bool>(3)?,
                    ))
                },
            )
            .optional()?;
        row.map(|r| Self::load_profile(&conn, r)).transpose().map_err(Into::into)
    }

    /// 某客户的订阅；外层 Option 表示客户是否存在
    pub fn subscription_for(
        &self,
        customer_id: &str,
    ) -> Result<Option<(String, Option<SubscriptionRecord>)>, StorageError> {
        let Some(profile) = self.customer_by_id(customer_id)? else {
            return Ok(None);
        };
        Ok(Some((profile.full_name, profile.subscription)))
    }

    /// 某客户的预订列表（可按状态过滤）；外层 Option 表示客户是否存在
    pub fn reservations_for(
        &self,
        customer_id: &str,
        status: Option<&str>,
    ) -> Result<Option<(String, Vec<ReservationRecord>)>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let full_name: Option<String> = conn
            .query_row(
                "SELECT full_name FROM customers WHERE customer_id = ?1",
                params![customer_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(full_name) = full_name else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT r.reservation_id, COALESCE(e.title, 'Unknown Experience'), r.status, r.created_at
             FROM reservations r
             LEFT JOIN experiences e ON e.experience_id = r.experience_id
             WHERE r.customer_id = ?1 AND (?2 IS NULL OR r.status = ?2)
             ORDER BY r.created_at ASC",
        )?;
        let rows = stmt.query_map(params![customer_id, status], |row| {
            Ok(ReservationRecord {
                reservation_id: row.get(0)?,
                experience_title: row.get(1)?,
                status: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        let mut reservations = Vec::new();
        for row in rows {
            reservations.push(row?);
        }
        Ok(Some((full_name, reservations)))
    }

    pub fn experience_by_id(
        &self,
        experience_id: &str,
    ) -> Result<Option<ExperienceRecord>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.query_row(
            "SELECT experience_id, title, description, location, happens_at, slots_available, is_premium
             FROM experiences WHERE experience_id = ?1",
            params![experience_id],
            Self::experience_from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    /// 标题模糊查询（大小写不敏感的部分匹配）
    pub fn experiences_by_title(&self, search: &str) -> Result<Vec<ExperienceRecord>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let pattern = format!("%{}%", search);
        let mut stmt = conn.prepare(
            "SELECT experience_id, title, description, location, happens_at, slots_available, is_premium
             FROM experiences WHERE title LIKE ?1 ORDER BY title ASC",
        )?;
        let rows = stmt.query_map(params![pattern], Self::experience_from_row)?;
        let mut experiences = Vec::new();
        for row in rows {
            experiences.push(row?);
        }
        Ok(experiences)
    }

    fn experience_from_row(row: &rusqlite::Row<'_>) -> Result<ExperienceRecord, rusqlite::Error> {
        Ok(ExperienceRecord {
            experience_id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            location: row.get(3)?,
            happens_at: row.get(4)?,
            slots_available: row.get(5)?,
            is_premium: row.get(6)?,
        })
    }

    // --- 测试与演示数据写入 ---

    pub fn insert_customer(
        &self,
        customer_id: &str,
        full_name: &str,
        email: &str,
        is_blocked: bool,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(
            "INSERT INTO customers (customer_id, full_name, email, is_blocked)
             VALUES (?1, ?2, ?3, ?4)",
            params![customer_id, full_name, email, is_blocked],
        )?;
        Ok(())
    }

    pub fn insert_subscription(
        &self,
        customer_id: &str,
        tier: &str,
        status: &str,
        monthly_quota: i64,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(
            "INSERT INTO subscriptions (customer_id, tier, status, monthly_quota, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![customer_id, tier, status, monthly_quota, Utc::now()],
        )?;
        Ok(())
    }

    pub fn insert_experience(
        &self,
        experience_id: &str,
        title: &str,
        description: &str,
        location: &str,
        happens_at: &str,
        slots_available: i64,
        is_premium: bool,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(
            "INSERT INTO experiences
             (experience_id, title, description, location, happens_at, slots_available, is_premium)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![experience_id, title, description, location, happens_at, slots_available, is_premium],
        )?;
        Ok(())
    }

    pub fn insert_reservation(
        &self,
        reservation_id: &str,
        customer_id: &str,
        experience_id: &str,
        status: &str,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(
            "INSERT INTO reservations (reservation_id, customer_id, experience_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![reservation_id, customer_id, experience_id, status, Utc::now()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> ProductStore {
        let store = ProductStore::open_in_memory().unwrap();
        store
            .insert_customer("a4ab87", "Alice Example", "alice@example.com", false)
            .unwrap();
        store
            .insert_subscription("a4ab87", "premium", "active", 8)
            .unwrap();
        store
            .insert_experience(
                "exp-1",
                "Museum Night Tour",
                "Evening tour of the modern art museum.",
                "Downtown",
                "2026-09-01 19:00",
                12,
                true,
            )
            .unwrap();
        store
            .insert_reservation("res-1", "a4ab87", "exp-1", "reserved")
            .unwrap();
        store
    }

    #[test]
    fn test_customer_profile_joins_subscription_and_reservations() {
        let store = seeded();
        let profile = store.customer_by_id("a4ab87").unwrap().unwrap();
        assert_eq!(profile.full_name, "Alice Example");
        assert!(!profile.is_blocked);
        assert_eq!(profile.subscription.as_ref().unwrap().tier, "premium");
        assert_eq!(profile.reservation_total, 1);
        assert_eq!(profile.reservation_active, 1);

        let by_email = store.customer_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(by_email.customer_id, "a4ab87");
    }

    #[test]
    fn test_missing_customer_is_none() {
        let store = seeded();
        assert!(store.customer_by_id("nope").unwrap().is_none());
        assert!(store.subscription_for("nope").unwrap().is_none());
        assert!(store.reservations_for("nope", None).unwrap().is_none());
    }

    #[test]
    fn test_reservation_status_filter() {
        let store = seeded();
        store
            .insert_reservation("res-2", "a4ab87", "exp-1", "cancelled")
            .unwrap();

        let (_, all) = store.reservations_for("a4ab87", None).unwrap().unwrap();
        assert_eq!(all.len(), 2);
        let (_, reserved) = store
            .reservations_for("a4ab87", Some("reserved"))
            .unwrap()
            .unwrap();
        assert_eq!(reserved.len(), 1);
        assert_eq!(reserved[0].experience_title, "Museum Night Tour");
    }

    #[test]
    fn test_experience_title_search() {
        let store = seeded();
        let hits = store.experiences_by_title("Museum").unwrap();
        assert_eq!(hits.len(), 1);
        assert!(store.experiences_by_title("Opera").unwrap().is_empty());
        assert!(store.experience_by_id("exp-1").unwrap().is_some());
    }
}
