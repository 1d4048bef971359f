mod analytics;
mod class_detail;
mod class_list;
mod dashboard;
mod department_list;
mod syllabus_list;
mod term_list;

pub use analytics::AnalyticsView;
pub use class_detail::ClassDetailView;
pub use class_list::ClassListView;
pub use dashboard::DashboardView;
pub use department_list::DepartmentListView;
pub use syllabus_list::SyllabusListView;
pub use term_list::TermListView;
