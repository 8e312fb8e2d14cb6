//! Camera picker queries over the directory.

use common::Camera;

/// Case-insensitive name/location filter over a directory snapshot.
///
/// The view borrows the snapshot, so it cannot outlive a directory refresh;
/// iterate it as often as needed while the search text changes.
#[derive(Debug, Clone)]
pub struct CameraQuery<'a> {
    cameras: &'a [Camera],
    needle: String,
}

impl<'a> CameraQuery<'a> {
    pub fn new(cameras: &'a [Camera]) -> Self {
        Self {
            cameras,
            needle: String::new(),
        }
    }

    pub fn search(&mut self, text: &str) -> &mut Self {
        self.needle = text.to_lowercase();
        self
    }

    pub fn search_text(&self) -> &str {
        &self.needle
    }

    pub fn matches(&self, camera: &Camera) -> bool {
        self.needle.is_empty()
            || camera.name.to_lowercase().contains(&self.needle)
            || camera.location.to_lowercase().contains(&self.needle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Camera> + '_ {
        self.cameras.iter().filter(move |camera| self.matches(camera))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

pub fn query<'a>(cameras: &'a [Camera], search_text: &str) -> CameraQuery<'a> {
    let mut query = CameraQuery::new(cameras);
    query.search(search_text);
    query
}

/// Whether `camera_id` already occupies a slot. Used to grey out picker entries.
pub fn is_assigned<'a, I>(camera_id: &str, assignment: I) -> bool
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    assignment.into_iter().flatten().any(|id| id == camera_id)
}
