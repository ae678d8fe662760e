mod stdio;
