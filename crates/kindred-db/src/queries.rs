use std::collections::HashMap;

use crate::Database;
use crate::models::{
    FriendRequestRow, FriendRow, InterestRow, ItemRow, NotFriendRow, NotificationRow,
    PendingRequestRow, UserCardRow, UserRow,
};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        name: &str,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, username, email, password) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, name, username, email, password_hash],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn email_taken(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| exists(conn, "SELECT 1 FROM users WHERE email = ?1", email))
    }

    pub fn username_taken(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| exists(conn, "SELECT 1 FROM users WHERE username = ?1", username))
    }

    pub fn get_user_card(&self, id: &str) -> Result<Option<UserCardRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, username, email, avatar FROM users WHERE id = ?1")?;
            let row = stmt
                .query_row([id], |row| {
                    Ok(UserCardRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        username: row.get(2)?,
                        email: row.get(3)?,
                        avatar: row.get(4)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    /// The user's payment tier, read fresh from storage. Entitlement checks
    /// never trust tier values baked into tokens.
    pub fn get_tier(&self, user_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT payment_tier FROM users WHERE id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn update_profile(
        &self,
        user_id: &str,
        name: &str,
        username: &str,
        bio: Option<&str>,
        city: Option<&str>,
        state: Option<&str>,
        bio_visibility: bool,
    ) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE users
                 SET name = ?1, username = ?2, bio = ?3, city = ?4, state = ?5, bio_visibility = ?6
                 WHERE id = ?7",
                rusqlite::params![name, username, bio, city, state, bio_visibility, user_id],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_user(conn, "id", user_id)
        })
    }

    pub fn update_avatar(&self, user_id: &str, avatar: &str) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE users SET avatar = ?1 WHERE id = ?2",
                rusqlite::params![avatar, user_id],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_user(conn, "id", user_id)
        })
    }

    /// Batch-resolve display names for a set of user IDs.
    pub fn display_names(&self, user_ids: &[String]) -> Result<HashMap<String, String>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=user_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, name FROM users WHERE id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = user_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;

            Ok(rows)
        })
    }

    // -- Interests --

    pub fn insert_interest(
        &self,
        id: &str,
        user_id: &str,
        category: &str,
        visibility: bool,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO interests (id, user_id, category, visibility) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, user_id, category, visibility],
            )?;
            Ok(())
        })
    }

    /// Conditional delete doubling as the ownership check: zero rows means
    /// the category is absent or not the caller's. Items go with it via
    /// the cascade.
    pub fn delete_interest_owned(&self, category_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM interests WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![category_id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }

    /// Insert an item after verifying the category belongs to `user_id`,
    /// all in one transaction. `None` means absent-or-not-owned.
    pub fn insert_item_owned(
        &self,
        item_id: &str,
        category_id: &str,
        user_id: &str,
        name: &str,
        rating: i64,
    ) -> Result<Option<ItemRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let owned = interest_owned(&tx, category_id, user_id)?;
            if !owned {
                return Ok(None);
            }

            tx.execute(
                "INSERT INTO items (id, interest_id, name, rating) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![item_id, category_id, name, rating],
            )?;

            let item = query_item(&tx, item_id)?;
            tx.commit()?;
            Ok(item)
        })
    }

    /// Update an item's rating inside the same transaction as the
    /// ownership check. `None` covers not-owned and item-missing alike.
    pub fn update_item_rating_owned(
        &self,
        category_id: &str,
        user_id: &str,
        item_id: &str,
        rating: i64,
    ) -> Result<Option<ItemRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let owned = interest_owned(&tx, category_id, user_id)?;
            if !owned {
                return Ok(None);
            }

            let updated = tx.execute(
                "UPDATE items SET rating = ?1 WHERE id = ?2 AND interest_id = ?3",
                rusqlite::params![rating, item_id, category_id],
            )?;
            if updated == 0 {
                return Ok(None);
            }

            let item = query_item(&tx, item_id)?;
            tx.commit()?;
            Ok(item)
        })
    }

    /// Delete an item. Returns false when the category is absent or not
    /// the caller's; deleting an already-gone item is not an error.
    pub fn delete_item_owned(
        &self,
        category_id: &str,
        user_id: &str,
        item_id: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let owned = interest_owned(&tx, category_id, user_id)?;
            if !owned {
                return Ok(false);
            }

            tx.execute(
                "DELETE FROM items WHERE id = ?1 AND interest_id = ?2",
                rusqlite::params![item_id, category_id],
            )?;

            tx.commit()?;
            Ok(true)
        })
    }

    /// A user's interest categories with their items. Caps apply only
    /// under the capped visibility policy; `None` means unlimited.
    pub fn interests_with_items(
        &self,
        user_id: &str,
        category_cap: Option<u32>,
        item_cap: Option<u32>,
    ) -> Result<Vec<(InterestRow, Vec<ItemRow>)>> {
        self.with_conn(|conn| {
            let limit: i64 = category_cap.map(i64::from).unwrap_or(-1);

            let mut stmt = conn.prepare(
                "SELECT id, user_id, category, visibility
                 FROM interests
                 WHERE user_id = ?1
                 ORDER BY created_at
                 LIMIT ?2",
            )?;
            let interests = stmt
                .query_map(rusqlite::params![user_id, limit], |row| {
                    Ok(InterestRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        category: row.get(2)?,
                        visibility: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            if interests.is_empty() {
                return Ok(vec![]);
            }

            // Batch-fetch items for all categories in one query, then
            // group in memory.
            let ids: Vec<&String> = interests.iter().map(|i| &i.id).collect();
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, interest_id, name, rating FROM items
                 WHERE interest_id IN ({})
                 ORDER BY created_at",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = ids
                .iter()
                .map(|id| *id as &dyn rusqlite::types::ToSql)
                .collect();
            let items = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(ItemRow {
                        id: row.get(0)?,
                        interest_id: row.get(1)?,
                        name: row.get(2)?,
                        rating: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut by_interest: HashMap<String, Vec<ItemRow>> = HashMap::new();
            for item in items {
                by_interest
                    .entry(item.interest_id.clone())
                    .or_default()
                    .push(item);
            }

            let cap = item_cap.map(|c| c as usize);
            Ok(interests
                .into_iter()
                .map(|interest| {
                    let mut items = by_interest.remove(&interest.id).unwrap_or_default();
                    if let Some(cap) = cap {
                        items.truncate(cap);
                    }
                    (interest, items)
                })
                .collect())
        })
    }

    // -- Friend requests / friendships --

    /// Insert a pending request unless any request already exists between
    /// the pair, in either direction and any status. The partial unique
    /// index on pending rows backs the in-transaction check.
    pub fn create_friend_request(
        &self,
        id: &str,
        sender_id: &str,
        receiver_id: &str,
    ) -> Result<Option<FriendRequestRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let duplicate: bool = tx
                .query_row(
                    "SELECT 1 FROM friend_requests
                     WHERE (sender_id = ?1 AND receiver_id = ?2)
                        OR (sender_id = ?2 AND receiver_id = ?1)
                     LIMIT 1",
                    rusqlite::params![sender_id, receiver_id],
                    |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false);
            if duplicate {
                return Ok(None);
            }

            tx.execute(
                "INSERT INTO friend_requests (id, sender_id, receiver_id, status)
                 VALUES (?1, ?2, ?3, 'pending')",
                rusqlite::params![id, sender_id, receiver_id],
            )?;

            let request = query_request(&tx, id)?;
            tx.commit()?;
            Ok(request)
        })
    }

    /// Resolve a pending request. The conditional update doubles as the
    /// ownership check: zero rows updated means the request is absent, not
    /// addressed to `receiver_id`, or already terminal. Acceptance writes
    /// both friendship edges in the same transaction.
    pub fn respond_to_request(
        &self,
        request_id: &str,
        receiver_id: &str,
        status: &str,
    ) -> Result<Option<FriendRequestRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let updated = tx.execute(
                "UPDATE friend_requests SET status = ?1
                 WHERE id = ?2 AND receiver_id = ?3 AND status = 'pending'",
                rusqlite::params![status, request_id, receiver_id],
            )?;
            if updated == 0 {
                return Ok(None);
            }

            let request = query_request(&tx, request_id)?
                .ok_or_else(|| anyhow::anyhow!("friend request vanished mid-transaction"))?;

            if request.status == "accepted" {
                tx.execute(
                    "INSERT INTO friendships (user_id, friend_id) VALUES (?1, ?2), (?2, ?1)",
                    rusqlite::params![request.receiver_id, request.sender_id],
                )?;
            }

            tx.commit()?;
            Ok(Some(request))
        })
    }

    pub fn list_pending_requests(&self, receiver_id: &str) -> Result<Vec<PendingRequestRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT fr.id, fr.sender_id, fr.status, u.name, u.username, u.avatar
                 FROM friend_requests fr
                 JOIN users u ON fr.sender_id = u.id
                 WHERE fr.receiver_id = ?1 AND fr.status = 'pending'
                 ORDER BY fr.created_at DESC",
            )?;
            let rows = stmt
                .query_map([receiver_id], |row| {
                    Ok(PendingRequestRow {
                        id: row.get(0)?,
                        sender_id: row.get(1)?,
                        status: row.get(2)?,
                        name: row.get(3)?,
                        username: row.get(4)?,
                        avatar: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_friends(&self, user_id: &str) -> Result<Vec<FriendRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.name, u.username, u.avatar
                 FROM users u
                 INNER JOIN friendships f ON u.id = f.friend_id
                 WHERE f.user_id = ?1
                 ORDER BY f.created_at",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(FriendRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        username: row.get(2)?,
                        avatar: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Everyone except the caller and their friends, annotated with any
    /// outstanding request between the pair (either direction).
    pub fn list_not_friends(&self, user_id: &str) -> Result<Vec<NotFriendRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.name, u.username, u.email, u.avatar, fr.status, fr.id
                 FROM users u
                 LEFT JOIN friend_requests fr
                   ON (fr.sender_id = ?1 AND fr.receiver_id = u.id)
                   OR (fr.receiver_id = ?1 AND fr.sender_id = u.id)
                 WHERE u.id != ?1
                 AND u.id NOT IN (
                     SELECT friend_id FROM friendships WHERE user_id = ?1
                 )
                 ORDER BY u.username",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(NotFriendRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        username: row.get(2)?,
                        email: row.get(3)?,
                        avatar: row.get(4)?,
                        request_status: row.get(5)?,
                        request_id: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Notifications --

    /// Append-only. A missing target user fails the foreign key and the
    /// error propagates; callers emit only after the state change the
    /// notification describes has committed.
    pub fn insert_notification(
        &self,
        id: &str,
        user_id: &str,
        content: &str,
        kind: &str,
    ) -> Result<NotificationRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, content, type) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, user_id, content, kind],
            )?;
            query_notification(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("notification vanished after insert"))
        })
    }

    pub fn list_notifications(&self, user_id: &str) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, content, type, read, created_at
                 FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([user_id], map_notification)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flip the read flag. `None` when the notification is absent or not
    /// the caller's.
    pub fn mark_notification_read(
        &self,
        notification_id: &str,
        user_id: &str,
    ) -> Result<Option<NotificationRow>> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![notification_id, user_id],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_notification(conn, notification_id)
        })
    }

    // -- Account closure --

    pub fn billing_cleanup_done(&self, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            exists(
                conn,
                "SELECT 1 FROM billing_cleanups WHERE user_id = ?1",
                user_id,
            )
        })
    }

    /// Durable marker: the external payment cleanup for this closure has
    /// completed. Written before the local delete is attempted.
    pub fn mark_billing_cleanup_done(&self, user_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO billing_cleanups (user_id) VALUES (?1)",
                [user_id],
            )?;
            Ok(())
        })
    }

    /// Hard delete. Interests, items, requests, friendship edges,
    /// notifications and the cleanup marker all go via the cascades.
    pub fn delete_user(&self, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [user_id])?;
            Ok(deleted > 0)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, name, username, email, password, avatar, bio, bio_visibility,
                interests_visibility, city, state, payment_tier, billing_customer_id, created_at
         FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                username: row.get(2)?,
                email: row.get(3)?,
                password: row.get(4)?,
                avatar: row.get(5)?,
                bio: row.get(6)?,
                bio_visibility: row.get(7)?,
                interests_visibility: row.get(8)?,
                city: row.get(9)?,
                state: row.get(10)?,
                payment_tier: row.get(11)?,
                billing_customer_id: row.get(12)?,
                created_at: row.get(13)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_item(conn: &Connection, id: &str) -> Result<Option<ItemRow>> {
    let mut stmt = conn.prepare("SELECT id, interest_id, name, rating FROM items WHERE id = ?1")?;
    let row = stmt
        .query_row([id], |row| {
            Ok(ItemRow {
                id: row.get(0)?,
                interest_id: row.get(1)?,
                name: row.get(2)?,
                rating: row.get(3)?,
            })
        })
        .optional()?;
    Ok(row)
}

fn query_request(conn: &Connection, id: &str) -> Result<Option<FriendRequestRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, sender_id, receiver_id, status, created_at FROM friend_requests WHERE id = ?1",
    )?;
    let row = stmt
        .query_row([id], |row| {
            Ok(FriendRequestRow {
                id: row.get(0)?,
                sender_id: row.get(1)?,
                receiver_id: row.get(2)?,
                status: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;
    Ok(row)
}

fn query_notification(conn: &Connection, id: &str) -> Result<Option<NotificationRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, content, type, read, created_at FROM notifications WHERE id = ?1",
    )?;
    let row = stmt.query_row([id], map_notification).optional()?;
    Ok(row)
}

fn map_notification(row: &rusqlite::Row<'_>) -> std::result::Result<NotificationRow, rusqlite::Error> {
    Ok(NotificationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        kind: row.get(3)?,
        read: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn interest_owned(conn: &Connection, category_id: &str, user_id: &str) -> Result<bool> {
    let found: Option<bool> = conn
        .query_row(
            "SELECT 1 FROM interests WHERE id = ?1 AND user_id = ?2",
            rusqlite::params![category_id, user_id],
            |_| Ok(true),
        )
        .optional()?;
    Ok(found.unwrap_or(false))
}

fn exists(conn: &Connection, sql: &str, param: &str) -> Result<bool> {
    let found: Option<bool> = conn.query_row(sql, [param], |_| Ok(true)).optional()?;
    Ok(found.unwrap_or(false))
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
