use crate::error::FsError;
use crate::MAX_OPEN_FILES;

/// Small integer handed to user programs in place of an open file.
pub type OpenFileId = i32;

/// Fixed-capacity slot map from descriptor ids to open handles.
///
/// A slot is either unbound (`None`) or bound to one handle. Ids are slot
/// indices and the lowest free slot is always used first. `N` is the number of
/// slots; a table with `N = 1` behaves like a single open file register.
pub struct DescriptorTable<H, const N: usize = MAX_OPEN_FILES> {
    slots: [Option<H>; N],
}

impl<H, const N: usize> DescriptorTable<H, N> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Number of bound slots.
    pub fn bound(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    pub fn is_bound(&self, id: OpenFileId) -> bool {
        Self::index(id).map_or(false, |i| self.slots[i].is_some())
    }

    /// Binds `handle` to the lowest free id.
    pub fn bind(&mut self, handle: H) -> Result<OpenFileId, FsError> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(FsError::TooManyOpenFiles)?;
        self.slots[index] = Some(handle);
        Ok(index as OpenFileId)
    }

    pub fn get_mut(&mut self, id: OpenFileId) -> Result<&mut H, FsError> {
        Self::index(id)
            .and_then(|i| self.slots[i].as_mut())
            .ok_or(FsError::InvalidDescriptor(id))
    }

    /// Unbinds `id` and hands back its handle.
    pub fn unbind(&mut self, id: OpenFileId) -> Result<H, FsError> {
        Self::index(id)
            .and_then(|i| self.slots[i].take())
            .ok_or(FsError::InvalidDescriptor(id))
    }

    /// Lowest bound id whose handle satisfies `pred`.
    pub fn find<P: FnMut(&H) -> bool>(&self, mut pred: P) -> Option<OpenFileId> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().map_or(false, &mut pred))
            .map(|i| i as OpenFileId)
    }

    fn index(id: OpenFileId) -> Option<usize> {
        usize::try_from(id).ok().filter(|&i| i < N)
    }
}

impl<H, const N: usize> Default for DescriptorTable<H, N> {
    fn default() -> Self {
        Self::new()
    }
}
