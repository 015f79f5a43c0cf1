pub mod mock_github_server;
