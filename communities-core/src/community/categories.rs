//! Category and chat ordering
//!
//! Positions are dense: chats of one category, and the categories
//! themselves, are always numbered `0..n`.

use super::state::CommunityState;
use crate::description::CommunityCategory;
use crate::errors::{CommunityError, CommunityResult};

impl CommunityState {
    /// Chat ids of a category ordered by (position, id)
    fn category_chat_ids(&self, category_id: &str) -> Vec<String> {
        let mut chats: Vec<(i32, &String)> = self
            .description
            .chats
            .iter()
            .filter(|(_, chat)| chat.category_id == category_id)
            .map(|(id, chat)| (chat.position, id))
            .collect();
        chats.sort();
        chats.into_iter().map(|(_, id)| id.clone()).collect()
    }

    fn renumber_chats(&mut self, ids: &[String]) {
        for (position, id) in ids.iter().enumerate() {
            if let Some(chat) = self.description.chats.get_mut(id) {
                chat.position = position as i32;
            }
        }
    }

    pub(crate) fn sort_category_chats(&mut self, category_id: &str) {
        let ids = self.category_chat_ids(category_id);
        self.renumber_chats(&ids);
    }

    fn sorted_category_ids(&self) -> Vec<String> {
        let mut categories: Vec<(i32, &String)> = self
            .description
            .categories
            .iter()
            .map(|(id, c)| (c.position, id))
            .collect();
        categories.sort();
        categories.into_iter().map(|(_, id)| id.clone()).collect()
    }

    fn renumber_categories(&mut self, ids: &[String]) {
        for (position, id) in ids.iter().enumerate() {
            if let Some(category) = self.description.categories.get_mut(id) {
                category.position = position as i32;
            }
        }
    }

    /// Listed chats must exist and not belong to a different category
    fn check_assignable_chats(&self, category_id: &str, channel_ids: &[String]) -> CommunityResult<()> {
        for id in channel_ids {
            let chat = self
                .description
                .chats
                .get(id)
                .ok_or(CommunityError::ChatNotFound)?;
            if !chat.category_id.is_empty() && chat.category_id != category_id {
                return Err(CommunityError::ChatAlreadyAssigned);
            }
        }
        Ok(())
    }

    fn assign_chats(&mut self, category_id: &str, channel_ids: &[String]) {
        for (position, id) in channel_ids.iter().enumerate() {
            if let Some(chat) = self.description.chats.get_mut(id) {
                chat.category_id = category_id.to_string();
                chat.position = position as i32;
            }
        }
    }

    pub(crate) fn create_category_inner(
        &mut self,
        category_id: &str,
        name: &str,
        channel_ids: &[String],
    ) -> CommunityResult<()> {
        if self.description.categories.contains_key(category_id) {
            return Err(CommunityError::CategoryAlreadyExists);
        }
        self.check_assignable_chats(category_id, channel_ids)?;

        let position = self.description.categories.len() as i32;
        self.description.categories.insert(
            category_id.to_string(),
            CommunityCategory {
                category_id: category_id.to_string(),
                name: name.to_string(),
                position,
            },
        );

        self.assign_chats(category_id, channel_ids);
        self.sort_category_chats("");
        Ok(())
    }

    pub(crate) fn edit_category_inner(
        &mut self,
        category_id: &str,
        name: &str,
        channel_ids: &[String],
    ) -> CommunityResult<()> {
        if !self.description.categories.contains_key(category_id) {
            return Err(CommunityError::CategoryNotFound);
        }
        self.check_assignable_chats(category_id, channel_ids)?;

        let dropped: Vec<String> = self
            .category_chat_ids(category_id)
            .into_iter()
            .filter(|id| !channel_ids.contains(id))
            .collect();
        let empty_len = self.description.category_chat_count("");
        for (i, id) in dropped.iter().enumerate() {
            if let Some(chat) = self.description.chats.get_mut(id) {
                chat.category_id.clear();
                chat.position = (empty_len + i) as i32;
            }
        }

        if let Some(category) = self.description.categories.get_mut(category_id) {
            category.name = name.to_string();
        }

        self.assign_chats(category_id, channel_ids);
        self.sort_category_chats("");
        Ok(())
    }

    /// Chats of the deleted category move to the end of the uncategorized list
    pub(crate) fn delete_category_inner(&mut self, category_id: &str) -> CommunityResult<()> {
        if !self.description.categories.contains_key(category_id) {
            return Err(CommunityError::CategoryNotFound);
        }

        let moved = self.category_chat_ids(category_id);
        let empty_len = self.description.category_chat_count("");
        for (i, id) in moved.iter().enumerate() {
            if let Some(chat) = self.description.chats.get_mut(id) {
                chat.category_id.clear();
                chat.position = (empty_len + i) as i32;
            }
        }
        self.sort_category_chats("");

        self.description.categories.remove(category_id);
        let remaining = self.sorted_category_ids();
        self.renumber_categories(&remaining);
        Ok(())
    }

    pub(crate) fn reorder_category_inner(&mut self, category_id: &str, position: i32) -> CommunityResult<()> {
        let current = self
            .description
            .categories
            .get(category_id)
            .map(|c| c.position)
            .ok_or(CommunityError::CategoryNotFound)?;

        let len = self.description.categories.len() as i32;
        let mut target = position;
        if target > 0 && target >= len {
            target = len - 1;
        } else if target < 0 {
            target = 0;
        }

        if target == current {
            return Err(CommunityError::NoChangeInPosition);
        }

        let mut ids = self.sorted_category_ids();
        ids.retain(|id| id != category_id);
        ids.insert(target as usize, category_id.to_string());
        self.renumber_categories(&ids);
        Ok(())
    }

    /// Move a chat into `category_id` (empty for uncategorized) at `position`
    pub(crate) fn reorder_chat_inner(
        &mut self,
        category_id: &str,
        channel_id: &str,
        position: i32,
    ) -> CommunityResult<()> {
        if !category_id.is_empty() && !self.description.categories.contains_key(category_id) {
            return Err(CommunityError::CategoryNotFound);
        }
        let chat = self
            .description
            .chats
            .get_mut(channel_id)
            .ok_or(CommunityError::ChatNotFound)?;

        let old_category = std::mem::replace(&mut chat.category_id, category_id.to_string());
        if old_category != category_id {
            self.sort_category_chats(&old_category);
        }

        let mut ids: Vec<String> = self
            .category_chat_ids(category_id)
            .into_iter()
            .filter(|id| id != channel_id)
            .collect();
        let target = position.clamp(0, ids.len() as i32) as usize;
        ids.insert(target, channel_id.to_string());
        self.renumber_chats(&ids);
        Ok(())
    }
}
