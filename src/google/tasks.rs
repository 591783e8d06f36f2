use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::GoogleClient;
use crate::error::MomentumError;
use crate::week::DATE_FORMAT;

pub const DEFAULT_TASK_LIST: &str = "@default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    NeedsAction,
    Completed,
}

/// A task as the Tasks API sends and accepts it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

/// The flattened view of a task shown in a day's list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub due: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct TaskList {
    #[serde(default)]
    items: Vec<GoogleTask>,
}

impl From<GoogleTask> for TaskItem {
    fn from(task: GoogleTask) -> Self {
        TaskItem {
            id: task.id.unwrap_or_default(),
            title: task
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            description: task.notes,
            completed: task.status == Some(TaskStatus::Completed),
            due: task.due,
        }
    }
}

/// The calendar date of a task's `due`, read straight off the timestamp.
///
/// Tasks only store a date; the time part is always midnight UTC, so shifting
/// it into a local zone would move the task to the previous day.
pub fn due_date(task: &GoogleTask) -> Option<&str> {
    task.due.as_deref().and_then(|due| due.split('T').next())
}

pub fn due_for(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format(DATE_FORMAT))
}

/// Whether a freshly polled list differs from what is on screen.
pub fn tasks_changed(previous: &[TaskItem], next: &[TaskItem]) -> bool {
    previous.len() != next.len()
        || previous.iter().zip(next).any(|(p, n)| {
            p.id != n.id || p.title != n.title || p.completed != n.completed
        })
}

impl GoogleClient {
    pub async fn list_tasks(&self, task_list: &str) -> Result<Vec<GoogleTask>> {
        let url = self.endpoint(&["tasks", "v1", "lists", task_list, "tasks"])?;
        let request = self
            .authorized(self.http.get(url))
            .await?
            .query(&[("showCompleted", "true"), ("showHidden", "false")]);

        let list: TaskList = self.send_json(request).await?;
        Ok(list.items)
    }

    pub async fn tasks_due_on(&self, date: NaiveDate) -> Result<Vec<TaskItem>> {
        let day = date.format(DATE_FORMAT).to_string();
        Ok(self
            .list_tasks(DEFAULT_TASK_LIST)
            .await?
            .into_iter()
            .filter(|task| due_date(task) == Some(day.as_str()))
            .map(TaskItem::from)
            .collect())
    }

    pub async fn create_task(&self, input: &TaskInput) -> Result<TaskItem> {
        if input.title.trim().is_empty() {
            return Err(MomentumError::invalid("task title cannot be empty").into());
        }
        let task = GoogleTask {
            id: None,
            title: Some(input.title.clone()),
            notes: input.description.clone(),
            due: Some(due_for(input.date)),
            status: Some(TaskStatus::NeedsAction),
        };

        let url = self.endpoint(&["tasks", "v1", "lists", DEFAULT_TASK_LIST, "tasks"])?;
        let request = self.authorized(self.http.post(url)).await?.json(&task);
        let created: GoogleTask = self.send_json(request).await?;
        Ok(created.into())
    }

    pub async fn patch_task(&self, task_id: &str, patch: &GoogleTask) -> Result<TaskItem> {
        let url = self.endpoint(&["tasks", "v1", "lists", DEFAULT_TASK_LIST, "tasks", task_id])?;
        let request = self.authorized(self.http.patch(url)).await?.json(patch);
        let updated: GoogleTask = self.send_json(request).await?;
        Ok(updated.into())
    }

    pub async fn update_task(&self, task_id: &str, input: &TaskInput) -> Result<TaskItem> {
        if input.title.trim().is_empty() {
            return Err(MomentumError::invalid("task title cannot be empty").into());
        }
        let patch = GoogleTask {
            id: Some(task_id.to_string()),
            title: Some(input.title.clone()),
            notes: input.description.clone(),
            due: Some(due_for(input.date)),
            status: None,
        };
        self.patch_task(task_id, &patch).await
    }

    pub async fn set_task_completed(&self, task_id: &str, completed: bool) -> Result<TaskItem> {
        let status = if completed {
            TaskStatus::Completed
        } else {
            TaskStatus::NeedsAction
        };
        let patch = GoogleTask {
            id: Some(task_id.to_string()),
            status: Some(status),
            ..GoogleTask::default()
        };
        self.patch_task(task_id, &patch).await
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<()> {
        let url = self.endpoint(&["tasks", "v1", "lists", DEFAULT_TASK_LIST, "tasks", task_id])?;
        let request = self.authorized(self.http.delete(url)).await?;
        self.send_empty(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::tests::signed_in_client;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(id: &str, title: &str, completed: bool) -> TaskItem {
        TaskItem {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            completed,
            due: None,
        }
    }

    #[test]
    fn test_due_date_ignores_time_part() {
        let task = GoogleTask {
            due: Some("2024-03-06T00:00:00.000Z".to_string()),
            ..GoogleTask::default()
        };
        assert_eq!(due_date(&task), Some("2024-03-06"));
        assert_eq!(due_date(&GoogleTask::default()), None);
    }

    #[test]
    fn test_due_for_is_midnight_utc() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();
        assert_eq!(due_for(date), "2024-03-06T00:00:00.000Z");
    }

    #[test]
    fn test_tasks_changed() {
        let before = vec![item("1", "Call", false), item("2", "Pay rent", false)];
        assert!(!tasks_changed(&before, &before.clone()));

        let toggled = vec![item("1", "Call", true), item("2", "Pay rent", false)];
        assert!(tasks_changed(&before, &toggled));

        assert!(tasks_changed(&before, &before[..1]));
    }

    #[test]
    fn test_blank_title_becomes_untitled() {
        let task = GoogleTask {
            id: Some("t1".to_string()),
            title: Some("  ".to_string()),
            status: Some(TaskStatus::Completed),
            ..GoogleTask::default()
        };
        let view = TaskItem::from(task);
        assert_eq!(view.title, "Untitled");
        assert!(view.completed);
    }

    #[tokio::test]
    async fn test_tasks_due_on_filters_by_date() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/v1/lists/@default/tasks"))
            .and(query_param("showCompleted", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    { "id": "a", "title": "Today", "due": "2024-03-06T00:00:00.000Z", "status": "needsAction" },
                    { "id": "b", "title": "Tomorrow", "due": "2024-03-07T00:00:00.000Z", "status": "needsAction" },
                    { "id": "c", "title": "Someday" },
                    { "id": "d", "title": "Done", "due": "2024-03-06T00:00:00.000Z", "status": "completed" }
                ]
            })))
            .mount(&server)
            .await;

        let client = signed_in_client(&server.uri()).await;
        let tasks = client
            .tasks_due_on(NaiveDate::from_ymd_opt(2024, 3, 6).unwrap())
            .await
            .unwrap();

        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
        assert!(tasks[1].completed);
    }

    #[tokio::test]
    async fn test_create_task_sends_due_date() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tasks/v1/lists/@default/tasks"))
            .and(body_partial_json(json!({
                "title": "Buy strings",
                "due": "2024-03-07T00:00:00.000Z",
                "status": "needsAction"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "new-1",
                "title": "Buy strings",
                "due": "2024-03-07T00:00:00.000Z",
                "status": "needsAction"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = signed_in_client(&server.uri()).await;
        let created = client
            .create_task(&TaskInput {
                title: "Buy strings".to_string(),
                description: None,
                date: NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
            })
            .await
            .unwrap();

        assert_eq!(created.id, "new-1");
        assert!(!created.completed);
    }

    #[tokio::test]
    async fn test_google_errors_keep_status() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Task not found"))
            .mount(&server)
            .await;

        let client = signed_in_client(&server.uri()).await;
        let err = client.delete_task("missing").await.unwrap_err();
        match err.downcast_ref::<MomentumError>() {
            Some(MomentumError::Google { status, body }) => {
                assert_eq!(*status, 404);
                assert_eq!(body, "Task not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_task_moves_due_date() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/tasks/v1/lists/@default/tasks/t9"))
            .and(body_partial_json(json!({
                "title": "Renew passport",
                "due": "2024-03-08T00:00:00.000Z"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t9",
                "title": "Renew passport",
                "due": "2024-03-08T00:00:00.000Z",
                "status": "needsAction"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = signed_in_client(&server.uri()).await;
        let updated = client
            .update_task(
                "t9",
                &TaskInput {
                    title: "Renew passport".to_string(),
                    description: None,
                    date: NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.due.as_deref(), Some("2024-03-08T00:00:00.000Z"));

        let requests = server.received_requests().await.unwrap();
        let sent: serde_json::Value = requests[0].body_json().unwrap();
        assert!(sent.get("status").is_none());
    }

    #[tokio::test]
    async fn test_update_task_rejects_blank_title() {
        let client = signed_in_client("http://127.0.0.1:9").await;
        let err = client
            .update_task(
                "t9",
                &TaskInput {
                    title: " ".to_string(),
                    description: None,
                    date: NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MomentumError>(),
            Some(MomentumError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_task() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/tasks/v1/lists/@default/tasks/t3"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = signed_in_client(&server.uri()).await;
        client.delete_task("t3").await.unwrap();
    }
}
