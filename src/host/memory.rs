//! In-memory [`Host`] implementation.
//!
//! Models a window made of groups of tabbed surfaces plus free-floating
//! panels (surfaces not placed in any group, like a build output panel).
//! Text is stored per surface; all offsets are character offsets.

use super::{Host, HostError, HostEvent, HostResult, Location, ScrollPosition, SurfaceId};
use std::collections::HashMap;
use std::ops::Range;

/// State of one in-memory surface
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    pub text: String,
    pub name: Option<String>,
    pub dirty_suppressed: bool,
    pub syntax: Option<String>,
    pub settings: HashMap<String, serde_json::Value>,
    pub viewport: ScrollPosition,
    pub selection: Vec<Range<usize>>,
    /// Last offset passed to `show_offset`
    pub shown_offset: Option<usize>,
}

#[derive(Debug, Clone, Default)]
struct Group {
    surfaces: Vec<SurfaceId>,
    active: Option<SurfaceId>,
}

/// A window held entirely in memory
#[derive(Debug)]
pub struct MemoryHost {
    surfaces: HashMap<SurfaceId, MemorySurface>,
    groups: Vec<Group>,
    next_id: usize,
    focused: Option<SurfaceId>,
    /// Group new surfaces are opened in
    active_group: usize,
    panel_visible: bool,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new(1)
    }
}

impl MemoryHost {
    /// Create a window with `groups` empty groups (at least one)
    pub fn new(groups: usize) -> Self {
        Self {
            surfaces: HashMap::new(),
            groups: vec![Group::default(); groups.max(1)],
            next_id: 1,
            focused: None,
            active_group: 0,
            panel_visible: false,
        }
    }

    /// Open a new surface holding `text` at the end of `group`, and make it
    /// the active surface of that group
    pub fn open_surface(&mut self, group: usize, text: &str) -> SurfaceId {
        let id = self.allocate(text);
        let group = group.min(self.groups.len() - 1);
        self.groups[group].surfaces.push(id);
        self.groups[group].active = Some(id);
        id
    }

    /// Create a panel surface that belongs to no group, and show it
    pub fn open_panel(&mut self) -> SurfaceId {
        self.panel_visible = true;
        self.allocate("")
    }

    /// Append text to a surface, as an external process would
    pub fn append(&mut self, id: SurfaceId, text: &str) -> HostResult<()> {
        let surface = self.surface_mut(id)?;
        surface.text.push_str(text);
        Ok(())
    }

    /// Replace the whole text of a surface
    pub fn set_text(&mut self, id: SurfaceId, text: &str) -> HostResult<()> {
        let surface = self.surface_mut(id)?;
        surface.text = text.to_string();
        Ok(())
    }

    pub fn text(&self, id: SurfaceId) -> Option<&str> {
        self.surfaces.get(&id).map(|s| s.text.as_str())
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&MemorySurface> {
        self.surfaces.get(&id)
    }

    /// Close a surface the way a user would, returning the notification the
    /// host sends for it
    pub fn user_close(&mut self, id: SurfaceId) -> Option<HostEvent> {
        let location = self.location(id).ok();
        self.close(id).ok()?;
        Some(HostEvent::Closed {
            surface: id,
            location,
        })
    }

    /// Group that receives surfaces created with `create_surface`
    pub fn set_active_group(&mut self, group: usize) {
        self.active_group = group.min(self.groups.len() - 1);
    }

    pub fn focused(&self) -> Option<SurfaceId> {
        self.focused
    }

    pub fn panel_visible(&self) -> bool {
        self.panel_visible
    }

    /// Surfaces whose display name equals `name`
    pub fn surfaces_named(&self, name: &str) -> Vec<SurfaceId> {
        let mut found: Vec<SurfaceId> = self
            .surfaces
            .iter()
            .filter(|(_, s)| s.name.as_deref() == Some(name))
            .map(|(id, _)| *id)
            .collect();
        found.sort();
        found
    }

    fn allocate(&mut self, text: &str) -> SurfaceId {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        self.surfaces.insert(
            id,
            MemorySurface {
                text: text.to_string(),
                ..Default::default()
            },
        );
        id
    }

    fn surface_ref(&self, id: SurfaceId) -> HostResult<&MemorySurface> {
        self.surfaces.get(&id).ok_or(HostError::SurfaceGone(id))
    }

    fn surface_mut(&mut self, id: SurfaceId) -> HostResult<&mut MemorySurface> {
        self.surfaces.get_mut(&id).ok_or(HostError::SurfaceGone(id))
    }

    fn detach(&mut self, id: SurfaceId) {
        for group in &mut self.groups {
            if let Some(pos) = group.surfaces.iter().position(|s| *s == id) {
                group.surfaces.remove(pos);
                if group.active == Some(id) {
                    // Activate the neighbour, like closing a tab does
                    let next = pos.min(group.surfaces.len().saturating_sub(1));
                    group.active = group.surfaces.get(next).copied();
                }
            }
        }
    }
}

/// Convert a character range into a byte range of `text`
fn byte_range(text: &str, range: Range<usize>) -> HostResult<Range<usize>> {
    let char_count = text.chars().count();
    if range.start > range.end || range.end > char_count {
        return Err(HostError::OutOfRange(format!(
            "{}..{} in a surface of {} characters",
            range.start, range.end, char_count
        )));
    }
    let to_byte = |offset: usize| {
        text.char_indices()
            .nth(offset)
            .map(|(b, _)| b)
            .unwrap_or(text.len())
    };
    Ok(to_byte(range.start)..to_byte(range.end))
}

impl Host for MemoryHost {
    fn surface_len(&self, id: SurfaceId) -> HostResult<usize> {
        Ok(self.surface_ref(id)?.text.chars().count())
    }

    fn read(&self, id: SurfaceId, range: Range<usize>) -> HostResult<String> {
        let text = &self.surface_ref(id)?.text;
        let bytes = byte_range(text, range)?;
        Ok(text[bytes].to_string())
    }

    fn replace(&mut self, id: SurfaceId, range: Range<usize>, text: &str) -> HostResult<()> {
        let surface = self.surface_mut(id)?;
        let bytes = byte_range(&surface.text, range)?;
        surface.text.replace_range(bytes, text);
        Ok(())
    }

    fn insert(&mut self, id: SurfaceId, offset: usize, text: &str) -> HostResult<()> {
        self.replace(id, offset..offset, text)
    }

    fn erase(&mut self, id: SurfaceId, range: Range<usize>) -> HostResult<()> {
        self.replace(id, range, "")
    }

    fn exists(&self, id: SurfaceId) -> bool {
        self.surfaces.contains_key(&id)
    }

    fn display_name(&self, id: SurfaceId) -> Option<String> {
        self.surfaces.get(&id).and_then(|s| s.name.clone())
    }

    fn set_display_name(&mut self, id: SurfaceId, name: &str) -> HostResult<()> {
        self.surface_mut(id)?.name = Some(name.to_string());
        Ok(())
    }

    fn set_dirty_suppressed(&mut self, id: SurfaceId, suppressed: bool) -> HostResult<()> {
        self.surface_mut(id)?.dirty_suppressed = suppressed;
        Ok(())
    }

    fn syntax(&self, id: SurfaceId) -> Option<String> {
        self.surfaces.get(&id).and_then(|s| s.syntax.clone())
    }

    fn set_syntax(&mut self, id: SurfaceId, syntax: &str) -> HostResult<()> {
        self.surface_mut(id)?.syntax = Some(syntax.to_string());
        Ok(())
    }

    fn surface_setting(&self, id: SurfaceId, key: &str) -> Option<serde_json::Value> {
        self.surfaces
            .get(&id)
            .and_then(|s| s.settings.get(key).cloned())
    }

    fn set_surface_setting(
        &mut self,
        id: SurfaceId,
        key: &str,
        value: serde_json::Value,
    ) -> HostResult<()> {
        self.surface_mut(id)?.settings.insert(key.to_string(), value);
        Ok(())
    }

    fn close(&mut self, id: SurfaceId) -> HostResult<()> {
        if self.surfaces.remove(&id).is_none() {
            return Err(HostError::SurfaceGone(id));
        }
        self.detach(id);
        if self.focused == Some(id) {
            self.focused = None;
        }
        Ok(())
    }

    fn location(&self, id: SurfaceId) -> HostResult<Location> {
        self.surface_ref(id)?;
        self.groups
            .iter()
            .enumerate()
            .find_map(|(g, group)| {
                group
                    .surfaces
                    .iter()
                    .position(|s| *s == id)
                    .map(|index| Location::new(g, index))
            })
            .ok_or(HostError::NotPlaced(id))
    }

    fn set_location(&mut self, id: SurfaceId, location: Location) -> HostResult<()> {
        self.surface_ref(id)?;
        if location.group >= self.groups.len() {
            return Err(HostError::OutOfRange(format!(
                "group {} of {}",
                location.group,
                self.groups.len()
            )));
        }
        self.detach(id);
        let group = &mut self.groups[location.group];
        let index = location.index.min(group.surfaces.len());
        group.surfaces.insert(index, id);
        group.active = Some(id);
        Ok(())
    }

    fn viewport(&self, id: SurfaceId) -> HostResult<ScrollPosition> {
        Ok(self.surface_ref(id)?.viewport)
    }

    fn set_viewport(&mut self, id: SurfaceId, position: ScrollPosition) -> HostResult<()> {
        self.surface_mut(id)?.viewport = position;
        Ok(())
    }

    fn selection(&self, id: SurfaceId) -> HostResult<Vec<Range<usize>>> {
        Ok(self.surface_ref(id)?.selection.clone())
    }

    fn set_selection(&mut self, id: SurfaceId, selection: Vec<Range<usize>>) -> HostResult<()> {
        self.surface_mut(id)?.selection = selection;
        Ok(())
    }

    fn show_offset(&mut self, id: SurfaceId, offset: usize) -> HostResult<()> {
        let surface = self.surface_mut(id)?;
        let top_line = surface
            .text
            .chars()
            .take(offset)
            .filter(|c| *c == '\n')
            .count();
        surface.viewport.top_line = top_line;
        surface.shown_offset = Some(offset);
        Ok(())
    }

    fn create_surface(&mut self) -> SurfaceId {
        let group = self.active_group;
        self.open_surface(group, "")
    }

    fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn surfaces_in_group(&self, group: usize) -> Vec<SurfaceId> {
        self.groups
            .get(group)
            .map(|g| g.surfaces.clone())
            .unwrap_or_default()
    }

    fn active_surface_in_group(&self, group: usize) -> Option<SurfaceId> {
        self.groups.get(group).and_then(|g| g.active)
    }

    fn surfaces(&self) -> Vec<SurfaceId> {
        let mut ids: Vec<SurfaceId> = self.surfaces.keys().copied().collect();
        ids.sort();
        ids
    }

    fn focus(&mut self, id: SurfaceId) -> HostResult<()> {
        self.surface_ref(id)?;
        if let Ok(location) = self.location(id) {
            self.groups[location.group].active = Some(id);
            self.active_group = location.group;
        }
        self.focused = Some(id);
        Ok(())
    }

    fn hide_panel(&mut self) {
        self.panel_visible = false;
    }
}
