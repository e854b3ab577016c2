use crate::consts::InodePointer;
use crate::driver::DeviceDriver;
use crate::structure::Structure;
use crate::util::error::{Error, Result};

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}

impl<A: DeviceDriver> Structure<A> {
    /// Walks `path` from the root. Empty components are skipped, so `""`,
    /// `"/"` and `"//"` all name the root.
    pub fn resolve(&self, path: &str) -> Result<InodePointer> {
        components(path).try_fold(self.root_ino(), |ino, name| self.step(ino, name))
    }

    /// Resolves everything but the last component and hands that back as a
    /// name. Fails with `InvalidName` for the root itself.
    pub fn resolve_parent<'p>(&self, path: &'p str) -> Result<(InodePointer, &'p str)> {
        let parts: Vec<&str> = components(path).collect();
        let (name, parents) = parts.split_last().ok_or_else(|| Error::InvalidName(path.to_string()))?;
        let parent = parents.iter().try_fold(self.root_ino(), |ino, part| self.step(ino, part))?;
        if !self.get_inode(parent)?.is_directory() {
            return Err(Error::NotADirectory);
        }
        Ok((parent, *name))
    }

    fn step(&self, ino: InodePointer, name: &str) -> Result<InodePointer> {
        let dir = self.get_inode(ino)?;
        if !dir.is_directory() {
            return Err(Error::NotADirectory);
        }
        // a name that cannot be stored cannot be found either
        self.dir_lookup(&dir, name).map_err(|e| match e {
            Error::NameTooLong(_) | Error::InvalidName(_) => Error::NotFound,
            other => other,
        })
    }
}
