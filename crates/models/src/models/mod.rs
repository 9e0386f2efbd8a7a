pub mod attachment;
pub mod board_column;
pub mod label;
pub mod organization;
pub mod profile;
pub mod project;
pub mod task;

pub use attachment::{Attachment, AttachmentTarget, CreateAttachment};
pub use board_column::{BoardColumn, CreateBoardColumn, UpdateBoardColumn};
pub use label::{CreateLabel, Label};
pub use organization::{CreateOrganization, Organization, UpdateOrganization};
pub use profile::{Capability, CreateProfile, Profile, Role, UpdateProfile};
pub use project::{CreateProject, Project, UpdateProject};
pub use task::{CreateTask, Task, TaskAssociations, UpdateTask};
