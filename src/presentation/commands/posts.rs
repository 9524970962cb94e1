use serde::Serialize;
use tracing::debug;
use writedesk_api_types::{Post, PostId};

use crate::application::error::{AppError, ControllerError};
use crate::application::listing::ListingController;
use crate::application::post::{DeleteOutcome, PostController, PostRoute, SaveOutcome};
use crate::config::{FieldArgs, ListArgs, NewArgs, PostsCommand};

use super::Shell;
use super::input::read_opt_value;

pub(super) async fn handle(shell: &Shell, cmd: PostsCommand) -> Result<(), AppError> {
    match cmd {
        PostsCommand::List(args) => list(shell, args).await,
        PostsCommand::Tags => tags(shell).await,
        PostsCommand::Show(args) => show(shell, PostId::from(args.id), args.html).await,
        PostsCommand::New(args) => create(shell, args).await,
        PostsCommand::Edit(args) => edit(shell, PostId::from(args.id), args.fields).await,
        PostsCommand::Delete(args) => delete(shell, PostId::from(args.id)).await,
    }
}

async fn list(shell: &Shell, args: ListArgs) -> Result<(), AppError> {
    if args.refresh {
        shell.ctx.cache.invalidate_posts();
    }
    let listing = ListingController::new(shell.ctx.clone());
    let loaded = listing.mount().await;
    if let Some(tag) = args.tag.as_deref() {
        listing.select_tag(tag);
    }
    let entries = listing.entries();
    listing.unmount();
    loaded?;

    debug!(tag = %listing.active_tag(), count = entries.len(), "Listing posts");
    for post in &entries {
        println!("{}", summary_line(post));
    }
    Ok(())
}

async fn tags(shell: &Shell) -> Result<(), AppError> {
    let listing = ListingController::new(shell.ctx.clone());
    let loaded = listing.mount().await;
    listing.unmount();
    loaded?;

    let active = listing.active_tag();
    for tag in listing.tags() {
        let marker = if tag == active { "*" } else { " " };
        println!("{marker} {tag}");
    }
    Ok(())
}

async fn show(shell: &Shell, id: PostId, html: bool) -> Result<(), AppError> {
    let controller = PostController::new(shell.ctx.clone());
    let opened = controller.open(PostRoute::Existing(id)).await;
    let view = controller.view();
    controller.unmount();
    opened?;

    let post = view.post.ok_or(ControllerError::NotLoaded)?;
    println!("title: {}", post.title);
    println!("date: {}", post.date);
    if let Some(tag) = post.tag.as_deref() {
        println!("tag: {tag}");
    }
    if !post.description.is_empty() {
        println!("description: {}", post.description);
    }
    println!();
    if html {
        println!("{}", shell.renderer.render(&view.draft)?);
    } else {
        println!("{}", view.draft);
    }
    Ok(())
}

async fn create(shell: &Shell, args: NewArgs) -> Result<(), AppError> {
    let controller = PostController::new(shell.ctx.clone());
    controller.open(PostRoute::New).await?;
    if let Some(tag) = args.tag {
        controller.set_tag(Some(tag))?;
    }
    apply_fields(&controller, args.fields)?;
    finish_save(shell, &controller).await
}

async fn edit(shell: &Shell, id: PostId, fields: FieldArgs) -> Result<(), AppError> {
    let controller = PostController::new(shell.ctx.clone());
    controller.open(PostRoute::Existing(id)).await?;
    controller.edit()?;
    apply_fields(&controller, fields)?;
    finish_save(shell, &controller).await
}

fn apply_fields(controller: &PostController, fields: FieldArgs) -> Result<(), AppError> {
    let FieldArgs {
        title,
        description,
        date,
        content,
        content_file,
    } = fields;

    if let Some(title) = title {
        controller.set_title(title)?;
    }
    if let Some(description) = description {
        controller.set_description(description)?;
    }
    if let Some(date) = date {
        controller.set_date(date)?;
    }
    if let Some(content) = read_opt_value(content, content_file)? {
        controller.update_draft(content)?;
    }
    Ok(())
}

async fn finish_save(shell: &Shell, controller: &PostController) -> Result<(), AppError> {
    let outcome = controller.save().await;
    controller.unmount();

    match outcome? {
        SaveOutcome::Saved(post) => {
            debug!(route = ?shell.navigator.last_route(), "Save finished");
            print_json(&post)
        }
        SaveOutcome::Busy | SaveOutcome::Detached => Err(AppError::InvalidInput(
            "the save did not complete".into(),
        )),
    }
}

async fn delete(shell: &Shell, id: PostId) -> Result<(), AppError> {
    let controller = PostController::new(shell.ctx.clone());
    controller.open(PostRoute::Existing(id.clone())).await?;
    let outcome = controller.delete().await;
    controller.unmount();

    match outcome? {
        DeleteOutcome::Deleted => println!("Deleted post {id}."),
        DeleteOutcome::Declined => println!("Kept post {id}."),
        DeleteOutcome::Unavailable | DeleteOutcome::Busy | DeleteOutcome::Detached => {
            return Err(AppError::InvalidInput(format!(
                "post {id} could not be deleted"
            )));
        }
    }
    Ok(())
}

fn summary_line(post: &Post) -> String {
    let id = post.id.as_ref().map_or("-", PostId::as_str);
    let tag = post.tag.as_deref().unwrap_or("-");
    format!("{id}\t{}\t{tag}\t{}", post.date, post.title)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn summary_line_is_tab_separated() {
        let post = Post {
            id: Some(PostId::from(2)),
            title: "Second".into(),
            date: date!(2024 - 03 - 01),
            description: String::new(),
            content: String::new(),
            tag: Some("Tech".into()),
        };
        assert_eq!(summary_line(&post), "2\t2024-03-01\tTech\tSecond");

        let untagged = Post { tag: None, id: None, ..post };
        assert_eq!(summary_line(&untagged), "-\t2024-03-01\t-\tSecond");
    }
}
