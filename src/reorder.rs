//! Drag-and-drop ordering of activities.
//!
//! The new order is computed in memory and then written back as one
//! `display_order` update per row. The writes are independent: a failure part
//! way through leaves a partial order that the next full load corrects.

use anyhow::Result;
use sqlx::sqlite::SqlitePool;
use tracing::info;

use crate::db;
use crate::error::MomentumError;
use crate::models::Id;

/// Move `from` so that it lands in the slot `to` occupied.
///
/// Moving downwards accounts for the slot freed by the removal, so the moved
/// id ends up just before `to`'s old position. Returns `None` when there is
/// nothing to do.
pub fn reorder(ids: &[Id], from: Id, to: Id) -> Option<Vec<Id>> {
    let from_index = ids.iter().position(|id| *id == from)?;
    let to_index = ids.iter().position(|id| *id == to)?;
    if from_index == to_index {
        return None;
    }

    let mut reordered = ids.to_vec();
    let moved = reordered.remove(from_index);
    let adjusted = if from_index < to_index {
        to_index - 1
    } else {
        to_index
    };
    reordered.insert(adjusted, moved);
    Some(reordered)
}

pub fn move_to_end(ids: &[Id], id: Id) -> Option<Vec<Id>> {
    let index = ids.iter().position(|i| *i == id)?;
    if index == ids.len() - 1 {
        return None;
    }

    let mut reordered = ids.to_vec();
    let moved = reordered.remove(index);
    reordered.push(moved);
    Some(reordered)
}

/// Write `display_order = index` for every id, one row at a time.
pub async fn apply_order(pool: &SqlitePool, ids: &[Id]) -> Result<()> {
    for (index, id) in ids.iter().enumerate() {
        db::set_display_order(pool, *id, index as i64).await?;
    }
    info!(count = ids.len(), "activity order saved");
    Ok(())
}

pub async fn reorder_activities(pool: &SqlitePool, from: Id, to: Id) -> Result<Vec<Id>> {
    let ids = active_ids(pool).await?;
    for id in [from, to] {
        if !ids.contains(&id) {
            return Err(MomentumError::not_found(format!("Activity {}", id)).into());
        }
    }

    match reorder(&ids, from, to) {
        Some(order) => {
            apply_order(pool, &order).await?;
            Ok(order)
        }
        None => Ok(ids),
    }
}

pub async fn move_activity_to_end(pool: &SqlitePool, id: Id) -> Result<Vec<Id>> {
    let ids = active_ids(pool).await?;
    if !ids.contains(&id) {
        return Err(MomentumError::not_found(format!("Activity {}", id)).into());
    }

    match move_to_end(&ids, id) {
        Some(order) => {
            apply_order(pool, &order).await?;
            Ok(order)
        }
        None => Ok(ids),
    }
}

async fn active_ids(pool: &SqlitePool) -> Result<Vec<Id>> {
    Ok(db::read_active_activities(pool)
        .await?
        .into_iter()
        .map(|a| a.id)
        .collect())
}
