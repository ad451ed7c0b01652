//! `siteops-projects` — construction projects and their tasks.

pub mod project;
pub mod task;

pub use project::{
    AssignMember, CancelProject, CompleteProject, CreateProject, HoldProject, Project,
    ProjectCommand, ProjectEvent, ProjectId, ProjectMember, ProjectRole, ProjectStatus,
    ResumeProject, StartProject,
};
pub use task::{
    AssignTask, CompleteTask, CreateTask, ReopenTask, StartTask, SubmitTaskForReview, Task,
    TaskCommand, TaskEvent, TaskId, TaskStatus,
};
